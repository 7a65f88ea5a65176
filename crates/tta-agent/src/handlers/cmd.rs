//! Local command execution for `/up`

use std::process::{ExitStatus, Stdio};

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use tokio::process::Command;

/// Response header carrying the command's error text on failure
pub const EXEC_ERR_HEADER: &str = "exec-err";

/// Run `program` and turn its outcome into a response.
///
/// The body is stdout followed by stderr. A command that cannot be spawned
/// or exits unsuccessfully yields status 500 with the error in `Exec-Err`.
pub async fn serve_cmd(program: &str, args: &[String]) -> Response {
    tracing::info!("Running {:?} {:?}", program, args);

    let (output, error) = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
    {
        Ok(output) => {
            let mut combined = output.stdout;
            combined.extend_from_slice(&output.stderr);
            let error = (!output.status.success()).then(|| exit_error(output.status));
            (combined, error)
        }
        Err(e) => (Vec::new(), Some(e.to_string())),
    };

    let output_len = output.len();
    let mut response = Response::new(Body::from(output));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );

    match error {
        Some(error) => {
            tracing::warn!(
                "Command {:?} {:?} failed, {} bytes of output: {}",
                program,
                args,
                output_len,
                error
            );
            let value = HeaderValue::from_str(&error)
                .unwrap_or_else(|_| HeaderValue::from_static("command failed"));
            response.headers_mut().insert(EXEC_ERR_HEADER, value);
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        }
        None => {
            tracing::info!(
                "Command {:?} {:?} finished, {} bytes of output",
                program,
                args,
                output_len
            );
        }
    }

    response
}

/// Error text for an unsuccessful exit, e.g. `exit status 3`
fn exit_error(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {}", code),
        // Killed by a signal; the platform text names it.
        None => status.to_string(),
    }
}
