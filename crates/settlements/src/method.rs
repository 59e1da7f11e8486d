use serde::{Deserialize, Serialize};

/// How funds moved: cash in hand or a bank transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementMethod {
    Cash,
    Transfer,
}
