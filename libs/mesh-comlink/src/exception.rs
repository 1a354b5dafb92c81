//! Exception translation
//!
//! Folds a master completion into one typed result. An in-band exception code
//! wins over a transport fault reported for the same response.

use tracing::debug;

use crate::error::{ExceptionCode, LinkError, Result, TransportFault};
use crate::master::{Completion, RawResponse};

/// Translate a completion into the raw response or a typed error
pub fn translate(completion: Completion) -> Result<RawResponse> {
    let Completion { error, response } = completion;

    if let Some(code) = response.as_ref().and_then(|r| r.exception_code) {
        let code = ExceptionCode::from(code);
        if let Some(fault) = &error {
            debug!("Exception {} supersedes transport fault: {}", code, fault);
        }
        return Err(LinkError::DeviceException { code });
    }

    match (error, response) {
        (Some(fault), _) => Err(LinkError::Transport(fault)),
        (None, Some(response)) => Ok(response),
        (None, None) => Err(LinkError::Transport(TransportFault::new(
            "completion carried neither response nor error",
        ))),
    }
}
