use clap::Parser;
use ivy::cli::{generate_completions, AppConfig, Args, Commands};
use ivy::diagnostic::render_diagnostics;
use ivy::interpreter::{Interpreter, TokenParser};
use ivy::lexer::tokenize;
use owo_colors::OwoColorize;
use std::io::Read;
use std::path::Path;

fn main() {
    let args = Args::parse();

    if let Some(Commands::Complete { shell }) = args.command {
        generate_completions(shell);
        return;
    }

    let config = AppConfig::from_args(&args);

    verbose_log(&config, "Starting ivy");

    let (source, file_name) = match read_source(&args, &config) {
        Ok(pair) => pair,
        Err(e) => {
            error_message(&config, &e);
            std::process::exit(1);
        }
    };

    verbose_log(
        &config,
        &format!("Read {} bytes of source from {}", source.len(), file_name),
    );

    let tokens = tokenize(&source);
    verbose_log(&config, &format!("Lexed {} tokens", tokens.len()));

    let parsed = TokenParser::new(tokens).parse();
    let had_parse_errors = !parsed.errors.is_empty();
    if had_parse_errors {
        let diagnostics: Vec<_> = parsed.errors.iter().map(|e| e.to_diagnostic()).collect();
        eprint!(
            "{}",
            render_diagnostics(&source, &file_name, &diagnostics, config.color_enabled)
        );
    }

    verbose_log(
        &config,
        &format!("Executing {} statements", parsed.statements.len()),
    );

    // Recovered statements run even when parsing reported conditions.
    let mut interpreter = Interpreter::new();
    interpreter.run(&parsed.statements);

    let runtime_errors = interpreter.take_diagnostics();
    if !runtime_errors.is_empty() {
        let diagnostics: Vec<_> = runtime_errors.iter().map(|e| e.to_diagnostic()).collect();
        eprint!(
            "{}",
            render_diagnostics(&source, &file_name, &diagnostics, config.color_enabled)
        );
    }

    if had_parse_errors || !runtime_errors.is_empty() {
        std::process::exit(1);
    }
}

fn read_source(args: &Args, config: &AppConfig) -> Result<(String, String), String> {
    if let Some(file) = &args.file {
        verbose_log(config, &format!("Reading source from file: {}", file.display()));
        Ok((read_file(file)?, file.display().to_string()))
    } else if let Some(source) = &args.eval {
        verbose_log(config, "Reading source from command-line argument");
        Ok((source.clone(), "<eval>".to_string()))
    } else {
        verbose_log(config, "Reading source from stdin");
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;

        if buffer.trim().is_empty() {
            return Err(
                "No input provided. Must provide FILE, --eval, or a script via stdin".to_string(),
            );
        }

        Ok((buffer, "<stdin>".to_string()))
    }
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn verbose_log(config: &AppConfig, message: &str) {
    if config.verbose {
        eprintln!("[ivy:debug] {}", message);
    }
}

fn error_message(config: &AppConfig, message: &str) {
    if config.color_enabled {
        eprintln!("{}", message.red().bold());
    } else {
        eprintln!("{}", message);
    }
}
