use std::io::Write;

use machverify::{
    args::{self, Args},
    report::Report,
    sniff, Error,
};

fn run() -> Result<Report, Error> {
    let args = Args::from_env()?;
    log::debug!("Args: {args:?}");
    let classifier = sniff::classifier(args.classifier);
    machverify::scan(&args.app_path, args.target, classifier.as_ref())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let code = match run() {
        Ok(report) => {
            let written = if report.is_success() {
                report.write_summary(std::io::stdout().lock())
            } else {
                report.write_summary(std::io::stderr().lock())
            };
            if let Err(e) = written.and_then(|_| std::io::stdout().flush()) {
                log::error!("Failed to write report: {e}");
            }
            report.exit_code()
        }
        Err(Error::Usage(message)) => {
            args::usage();
            eprintln!("{message}");
            1
        }
        Err(e) => {
            log::error!("{e}");
            1
        }
    };
    std::process::exit(code);
}
