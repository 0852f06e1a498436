mod cli;

fn main() {
    let program = match cli::program() {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let argv: Vec<String> = std::env::args().collect();
    futures::executor::block_on(program.execute_argv(&argv, Some("help"), true));
}
