//! # Invocation Dispatcher
//!
//! Maps a named invocation with string arguments onto an
//! [`AssetContract`] method and renders the result as JSON. Hosts (CLI,
//! JSON-RPC) speak this shape; the contract itself stays strongly typed.
//!
//! | Function               | Arguments                      | Result              |
//! |------------------------|--------------------------------|---------------------|
//! | `InitLedger`           | none                           | `null`              |
//! | `CreateAsset`          | kind, owner, amount            | `null`              |
//! | `ReadAsset`            | kind, owner                    | asset               |
//! | `UpdateAsset`          | kind, owner, amount            | `null`              |
//! | `DeleteAsset`          | kind, owner                    | `null`              |
//! | `AssetExists`          | kind, owner                    | bool                |
//! | `TransferAsset`        | kind, from, to, amount         | prior owner         |
//! | `ConvertGemToExp`      | user, amount                   | `null`              |
//! | `TransferGemToDistrib` | user, amount (alias)           | `null`              |
//! | `GetAllAssets`         | none                           | array of assets     |
//! | `GetAssetsByKind`      | kind                           | array of assets     |
//! | `TotalSupply`          | kind                           | number              |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use gemledger_protocol::TxContext;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::AssetContract;

/// A function name plus positional string arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(function: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn expect_args(&self, count: usize) -> LedgerResult<&[String]> {
        if self.args.len() != count {
            return Err(LedgerError::InvalidArgument(format!(
                "{} takes {count} argument(s), got {}",
                self.function,
                self.args.len()
            )));
        }
        Ok(&self.args)
    }
}

/// Parse a textual amount. Negative and non-numeric input is an
/// `InvalidArgument`, not a parse failure.
fn parse_amount(raw: &str) -> LedgerResult<u64> {
    let signed: i128 = raw
        .trim()
        .parse()
        .map_err(|_| LedgerError::InvalidArgument(format!("amount {raw:?} is not an integer")))?;
    u64::try_from(signed)
        .map_err(|_| LedgerError::InvalidArgument(format!("amount {raw:?} is out of range")))
}

/// Run `invocation` against `contract` within `ctx`.
pub fn invoke(
    contract: &AssetContract,
    ctx: &mut TxContext<'_>,
    invocation: &Invocation,
) -> LedgerResult<Value> {
    match invocation.function.as_str() {
        "InitLedger" => {
            invocation.expect_args(0)?;
            contract.init_ledger(ctx)?;
            Ok(Value::Null)
        }
        "CreateAsset" => {
            let args = invocation.expect_args(3)?;
            contract.create_asset(ctx, &args[0], &args[1], parse_amount(&args[2])?)?;
            Ok(Value::Null)
        }
        "ReadAsset" => {
            let args = invocation.expect_args(2)?;
            Ok(serde_json::to_value(contract.read_asset(ctx, &args[0], &args[1])?)?)
        }
        "UpdateAsset" => {
            let args = invocation.expect_args(3)?;
            contract.update_asset(ctx, &args[0], &args[1], parse_amount(&args[2])?)?;
            Ok(Value::Null)
        }
        "DeleteAsset" => {
            let args = invocation.expect_args(2)?;
            contract.delete_asset(ctx, &args[0], &args[1])?;
            Ok(Value::Null)
        }
        "AssetExists" => {
            let args = invocation.expect_args(2)?;
            Ok(Value::Bool(contract.asset_exists(ctx, &args[0], &args[1])?))
        }
        "TransferAsset" => {
            let args = invocation.expect_args(4)?;
            let amount = parse_amount(&args[3])?;
            Ok(Value::String(contract.transfer_asset(ctx, &args[0], &args[1], &args[2], amount)?))
        }
        "ConvertGemToExp" | "TransferGemToDistrib" => {
            let args = invocation.expect_args(2)?;
            contract.convert_gem_to_exp(ctx, &args[0], parse_amount(&args[1])?)?;
            Ok(Value::Null)
        }
        "GetAllAssets" => {
            invocation.expect_args(0)?;
            Ok(serde_json::to_value(contract.get_all_assets(ctx)?)?)
        }
        "GetAssetsByKind" => {
            let args = invocation.expect_args(1)?;
            Ok(serde_json::to_value(contract.get_assets_by_kind(ctx, &args[0])?)?)
        }
        "TotalSupply" => {
            let args = invocation.expect_args(1)?;
            Ok(Value::from(contract.total_supply(ctx, &args[0])?))
        }
        other => Err(LedgerError::UnknownFunction(other.to_string())),
    }
}
