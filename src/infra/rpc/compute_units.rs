//! Compute-unit estimation through simulation.

use tracing::{debug, instrument, warn};

use crate::domain::{
    ComputeUnitEstimate, Error, MAX_COMPUTE_UNIT_LIMIT, RpcFailure, RpcTransport,
    TransactionMessage,
};

/// Add a 10% margin to simulated units, rounded up and capped at the maximum
pub fn with_buffer(units: u64) -> u32 {
    let buffered = units.saturating_mul(11).div_ceil(10);
    buffered.min(u64::from(MAX_COMPUTE_UNIT_LIMIT)) as u32
}

/// Simulate `message` with the maximum limit and return the units it consumed.
///
/// A failed simulation is returned as [`Error::Simulation`], carrying the
/// units consumed before the failure.
#[instrument(skip_all)]
pub async fn estimate_compute_units(
    rpc: &dyn RpcTransport,
    message: &TransactionMessage,
) -> Result<u64, Error> {
    let unsigned = message
        .clone()
        .with_compute_unit_limit(MAX_COMPUTE_UNIT_LIMIT)
        .to_unsigned_transaction()?;
    let simulation = rpc.simulate_transaction(&unsigned).await?;

    if let Some(failure) = simulation.err {
        debug!(error = %failure, units_consumed = ?simulation.units_consumed, "Simulation failed");
        return Err(Error::Simulation {
            failure,
            units_consumed: simulation.units_consumed,
            logs: simulation.logs,
        });
    }

    simulation.units_consumed.ok_or_else(|| {
        RpcFailure::Response("simulation did not report consumed units".to_string()).into()
    })
}

/// Estimate the compute units of `message` and write the buffered limit into it.
///
/// With `skip_preflight`, a failed simulation still yields a limit taken from
/// the units it consumed, so the transaction can be sent and fail on-chain.
#[instrument(skip_all, fields(skip_preflight = skip_preflight))]
pub async fn estimate_and_update_compute_unit_limit(
    rpc: &dyn RpcTransport,
    message: TransactionMessage,
    skip_preflight: bool,
) -> Result<(TransactionMessage, ComputeUnitEstimate), Error> {
    match estimate_compute_units(rpc, &message).await {
        Ok(units) => {
            let limit = with_buffer(units);
            debug!(units, limit, "Estimated compute units");
            Ok((
                message.with_compute_unit_limit(limit),
                ComputeUnitEstimate::Estimated(limit),
            ))
        }
        Err(Error::Simulation {
            failure,
            units_consumed: Some(units),
            ..
        }) if skip_preflight => {
            let limit = with_buffer(units);
            warn!(
                error = %failure,
                limit,
                "Simulation failed, using consumed units because preflight is skipped"
            );
            Ok((
                message.with_compute_unit_limit(limit),
                ComputeUnitEstimate::RecoveredFromFailure(limit),
            ))
        }
        Err(e) => Err(e),
    }
}
