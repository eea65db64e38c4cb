mod enroll;
mod getca;

pub use enroll::run_enroll;
pub use getca::run_getca;

use crate::error::{Error, Result};
use crate::model::{Resolved, ResolvedOperation};
use crate::scep::{ScepEngine, Transport};

/// Runs the resolved operation.
///
/// # Errors
/// Returns the orchestrator's error, or `NotImplemented` for operations that
/// are validated but not executed.
pub async fn execute(
    resolved: &Resolved,
    transport: &impl Transport,
    engine: &impl ScepEngine,
) -> Result<()> {
    match &resolved.operation {
        ResolvedOperation::GetCaCert(request) => {
            run_getca(request, transport, engine).await?;
        }
        ResolvedOperation::Enroll(request) => {
            run_enroll(request, &resolved.common, transport, engine).await?;
        }
        ResolvedOperation::GetCert(_)
        | ResolvedOperation::GetCrl(_)
        | ResolvedOperation::GetNextCaCert(_) => {
            return Err(Error::NotImplemented(resolved.operation.operation().name()));
        }
    }
    Ok(())
}
