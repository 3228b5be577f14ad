//! Human-readable rendering of the typed error kinds.

use tofcam_core::{BuildError, CamError};

pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTransport => {
                "What happened: No transport was provided to the driver.\nHow to fix: This is a wiring bug in the tool; please report it.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nHow to fix: Edit the TOML config and rerun."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CamError>() {
        return match ce {
            CamError::Unavailable(msg) => format!(
                "What happened: The camera is unavailable ({msg}).\nLikely causes: Wrong device path, missing permissions, or the sensor is unplugged.\nHow to fix: Check the [device] path in the config (or --device) and the port permissions."
            ),
            CamError::StreamLost(msg) => format!(
                "What happened: The byte stream broke ({msg}).\nLikely causes: Cable pulled, sensor reset, or another process grabbed the port.\nHow to fix: Reconnect the sensor and run the command again."
            ),
            CamError::Timeout => "What happened: No frame arrived within the latch budget.\nHow to fix: Verify the sensor is streaming; raise [latch] budget_ms if the host is loaded.".to_string(),
            other => format!(
                "What happened: {other}.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!("Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {err}")
}
