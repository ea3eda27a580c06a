#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match tabseek_core::runtime::parse_cli_args(&args) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("[tabseek-core] {error}");
            std::process::exit(2);
        }
    };

    match tabseek_core::runtime::run_with_options(options).await {
        Ok(output) => println!("{output}"),
        Err(error) => {
            eprintln!("[tabseek-core] runtime failed: {error}");
            std::process::exit(1);
        }
    }
}
