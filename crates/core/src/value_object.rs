/// Marker for types compared by value rather than identity.
///
/// `Money` and `CurrencyCode` are value objects: two `EUR 10.00` amounts are
/// interchangeable, and arithmetic produces new values instead of mutating.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
