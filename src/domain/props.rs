use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;

#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display, Hash)]
pub struct TransactionId(pub String);

/// Code the user types into the banking app memo, also the polling key.
#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display, Hash)]
pub struct CorrelationCode(pub String);

/// Opaque QR reference, passed through to the presentation layer untouched.
#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display, Hash)]
pub struct QrPayload(pub String);

/// Whole currency units.
#[derive(
    Shrinkwrap, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Display, Hash,
)]
pub struct Amount(pub Decimal);

#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, Hash)]
pub struct Balance(pub Decimal);
