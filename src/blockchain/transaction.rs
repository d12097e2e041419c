use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::fmt;

/// Represents a value transfer between two addresses
///
/// Transactions carry no identity beyond their fields, so two transactions
/// with the same sender, receiver and value are equal. Nothing is validated:
/// values may be negative or exceed what the sender holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address
    pub sender: String,

    /// Receiver's address
    pub receiver: String,

    /// Amount being transferred
    #[serde(with = "lossless_f64")]
    pub value: f64,
}

/// Serde adapter keeping non-finite values distinct in JSON
///
/// Finite values stay plain numbers; infinities and NaN, which `serde_json`
/// would otherwise write as `null`, become the strings `"Infinity"`,
/// `"-Infinity"` and `"NaN"`.
pub(crate) mod lossless_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("Infinity")
        } else {
            serializer.serialize_str("-Infinity")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!("invalid value: {}", other))),
            },
        }
    }
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The address of the sender
    /// * `receiver` - The address of the receiver
    /// * `value` - The amount to transfer
    ///
    /// # Returns
    ///
    /// A new Transaction instance
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, value: f64) -> Self {
        Transaction {
            sender: sender.into(),
            receiver: receiver.into(),
            value,
        }
    }

    /// Field-by-field comparison using the value's bit pattern
    ///
    /// Unlike `==`, a NaN value matches itself.
    pub fn is_identical(&self, other: &Transaction) -> bool {
        self.sender == other.sender
            && self.receiver == other.receiver
            && self.value.to_bits() == other.value.to_bits()
    }

    /// Net effect of this transaction on the balance of `address`
    ///
    /// A self-transfer credits and debits the same address, netting to zero.
    pub fn balance_delta(&self, address: &str) -> f64 {
        let mut delta = 0.0;

        if self.receiver == address {
            delta += self.value;
        }

        if self.sender == address {
            delta -= self.value;
        }

        delta
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sender:   {}", self.sender)?;
        writeln!(f, "receiver: {}", self.receiver)?;
        write!(f, "value:    {:.6}", self.value)
    }
}
