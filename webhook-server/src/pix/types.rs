//! PIX notification types.
//!
//! [`PixRecord`] mirrors one element of the bank's `pix` array as it arrives on
//! the wire. [`PaymentEvent`] is the validated form kept in the ledger; it
//! serializes back with the bank's field names, which is what the web UI reads.

use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize, Serializer};

// =============================================================================
// Wire Types
// =============================================================================

/// One element of the webhook's `pix` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixRecord {
    /// End-to-end identifier assigned by the payment system
    pub end_to_end_id: String,
    /// Charge identifier; absent for payments not tied to a charge
    #[serde(default)]
    pub txid: Option<String>,
    /// Amount, normally a string such as "100.00"
    pub valor: serde_json::Value,
    /// Payment time, RFC 3339
    pub horario: String,
    /// Free-text message from the payer
    #[serde(default)]
    pub info_pagador: Option<String>,
    pub pagador: PixPayer,
    /// PIX key that received the payment
    #[serde(default)]
    pub chave: Option<String>,
    /// Amount breakdown; accepted but not stored
    #[serde(default)]
    pub componentes_valor: Option<serde_json::Value>,
}

/// Payer block of a PIX record.
#[derive(Debug, Clone, Deserialize)]
pub struct PixPayer {
    pub nome: String,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub cnpj: Option<String>,
}

impl PixRecord {
    /// Validate field contents and build the stored event.
    ///
    /// The error names the offending field.
    pub fn into_event(self) -> Result<PaymentEvent, String> {
        let amount = match &self.valor {
            serde_json::Value::String(s) => s.parse::<Amount>(),
            serde_json::Value::Number(n) => n.to_string().parse::<Amount>(),
            other => Err(AmountParseError(other.to_string())),
        }
        .map_err(|e| format!("field `valor`: {e}"))?;

        let timestamp = DateTime::parse_from_rfc3339(self.horario.trim())
            .map_err(|e| format!("field `horario`: invalid timestamp {:?}: {e}", self.horario))?;

        if self.end_to_end_id.trim().is_empty() {
            return Err("field `endToEndId`: must not be empty".to_string());
        }

        let tax_id = match (self.pagador.cpf, self.pagador.cnpj) {
            (Some(cpf), _) => Some(TaxId::Cpf(cpf)),
            (None, Some(cnpj)) => Some(TaxId::Cnpj(cnpj)),
            (None, None) => None,
        };

        Ok(PaymentEvent {
            transaction_id: self.txid,
            amount,
            timestamp,
            payer_info: self.info_pagador,
            payer: Payer {
                name: self.pagador.nome,
                tax_id,
            },
            end_to_end_id: self.end_to_end_id,
            key: self.chave,
        })
    }
}

// =============================================================================
// Stored Types
// =============================================================================

/// A received payment. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentEvent {
    #[serde(rename = "txid", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(rename = "valor")]
    pub amount: Amount,
    #[serde(rename = "horario")]
    pub timestamp: DateTime<FixedOffset>,
    #[serde(rename = "infoPagador", skip_serializing_if = "Option::is_none")]
    pub payer_info: Option<String>,
    #[serde(rename = "pagador")]
    pub payer: Payer,
    #[serde(rename = "endToEndId")]
    pub end_to_end_id: String,
    #[serde(rename = "chave", skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payer {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(flatten)]
    pub tax_id: Option<TaxId>,
}

/// Brazilian taxpayer id: CPF for people, CNPJ for companies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxId {
    Cpf(String),
    Cnpj(String),
}

/// Money amount held in centavos.
///
/// Parsed from the decimal string the bank sends, so no float rounding
/// enters the ledger. Serialized as a JSON number in reais.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount {
    cents: i64,
}

impl Amount {
    pub const ZERO: Amount = Amount { cents: 0 };

    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount {0:?}, expected a non-negative decimal with up to 2 places")]
pub struct AmountParseError(pub String);

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AmountParseError(s.to_string());
        let trimmed = s.trim();

        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if whole.is_empty()
            || fraction.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
            || trimmed.ends_with('.')
        {
            return Err(err());
        }

        let whole: i64 = whole.parse().map_err(|_| err())?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| err())? * 10,
            _ => fraction.parse().map_err(|_| err())?,
        };

        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .map(Amount::from_cents)
            .ok_or_else(err)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.cents as f64 / 100.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        Amount::from_cents(iter.map(|a| a.cents).sum())
    }
}

impl<'a> Sum<&'a PaymentEvent> for Amount {
    fn sum<I: Iterator<Item = &'a PaymentEvent>>(iter: I) -> Self {
        iter.map(|e| e.amount).sum()
    }
}
