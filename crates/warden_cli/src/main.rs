use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    warden_cli::run().await
}
