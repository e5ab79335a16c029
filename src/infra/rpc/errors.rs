//! Normalization of RPC error payloads.
//!
//! RPC nodes report transaction errors as JSON: payload-less variants as a
//! bare string, the others as a single-key object, e.g.
//! `{"InstructionError": [0, {"Custom": 1}]}`.

use serde::Serialize;
use serde_json::Value;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::RpcError;

pub use crate::domain::RpcErrorCode;
use crate::domain::{
    Error, InstructionErrorCode, InstructionFailure, NormalizationError, RpcFailure,
    TransactionErrorCode, TransactionFailure,
};

/// Normalize a JSON transaction error
pub fn transaction_failure_from_json(
    value: &Value,
) -> Result<TransactionFailure, NormalizationError> {
    match value {
        Value::String(name) => TransactionErrorCode::from_name(name)
            .map(TransactionFailure::Fieldless)
            .ok_or_else(|| unrecognized(value)),
        Value::Object(map) if map.len() == 1 => {
            let (name, payload) = map.iter().next().ok_or_else(|| unrecognized(value))?;
            match name.as_str() {
                "InstructionError" => {
                    let [index, error] = payload.as_array().map(Vec::as_slice).unwrap_or_default()
                    else {
                        return Err(unrecognized(value));
                    };
                    Ok(TransactionFailure::InstructionError {
                        index: as_u8(index).ok_or_else(|| unrecognized(value))?,
                        error: instruction_failure_from_json(error)?,
                    })
                }
                "DuplicateInstruction" => Ok(TransactionFailure::DuplicateInstruction {
                    index: as_u8(payload).ok_or_else(|| unrecognized(value))?,
                }),
                "InsufficientFundsForRent" => Ok(TransactionFailure::InsufficientFundsForRent {
                    account_index: account_index(payload).ok_or_else(|| unrecognized(value))?,
                }),
                "ProgramExecutionTemporarilyRestricted" => {
                    Ok(TransactionFailure::ProgramExecutionTemporarilyRestricted {
                        account_index: account_index(payload)
                            .ok_or_else(|| unrecognized(value))?,
                    })
                }
                _ => Err(unrecognized(value)),
            }
        }
        _ => Err(unrecognized(value)),
    }
}

/// Normalize a JSON instruction error
pub fn instruction_failure_from_json(
    value: &Value,
) -> Result<InstructionFailure, NormalizationError> {
    match value {
        // Older nodes report the Borsh error without its message.
        Value::String(name) if name == "BorshIoError" => {
            Ok(InstructionFailure::BorshIoError(String::new()))
        }
        Value::String(name) => InstructionErrorCode::from_name(name)
            .map(InstructionFailure::Fieldless)
            .ok_or_else(|| unrecognized(value)),
        Value::Object(map) if map.len() == 1 => match (map.get("Custom"), map.get("BorshIoError")) {
            (Some(code), _) => code
                .as_u64()
                .and_then(|code| u32::try_from(code).ok())
                .map(InstructionFailure::Custom)
                .ok_or_else(|| unrecognized(value)),
            (_, Some(Value::String(message))) => {
                Ok(InstructionFailure::BorshIoError(message.clone()))
            }
            _ => Err(unrecognized(value)),
        },
        _ => Err(unrecognized(value)),
    }
}

/// Normalize any serializable transaction error through its JSON form
pub fn transaction_failure_from_serializable<T: Serialize>(
    err: &T,
) -> Result<TransactionFailure, NormalizationError> {
    let value = serde_json::to_value(err)
        .map_err(|e| NormalizationError::UnrecognizedShape(e.to_string()))?;
    transaction_failure_from_json(&value)
}

/// Map Solana client errors to crate errors
pub fn map_solana_client_error(err: ClientError) -> Error {
    if let Some(transaction_error) = err.get_transaction_error() {
        return match transaction_failure_from_serializable(&transaction_error) {
            Ok(failure) => Error::Transaction(failure),
            Err(e) => Error::Normalization(e),
        };
    }

    let msg = err.to_string();

    match err.kind() {
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
            Error::Rpc(RpcFailure::Server {
                code: RpcErrorCode::from_code(*code),
                message: message.clone(),
            })
        }
        ClientErrorKind::Io(_) => Error::Rpc(RpcFailure::Connection(msg)),
        ClientErrorKind::Reqwest(e) if e.is_timeout() => Error::Rpc(RpcFailure::Timeout(msg)),
        ClientErrorKind::Reqwest(_) => Error::Rpc(RpcFailure::Connection(msg)),
        _ => Error::Rpc(RpcFailure::Response(msg)),
    }
}

fn as_u8(value: &Value) -> Option<u8> {
    value.as_u64().and_then(|n| u8::try_from(n).ok())
}

fn account_index(payload: &Value) -> Option<u8> {
    payload.get("account_index").and_then(as_u8)
}

fn unrecognized(value: &Value) -> NormalizationError {
    NormalizationError::UnrecognizedShape(value.to_string())
}
