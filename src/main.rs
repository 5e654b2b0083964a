use env_logger::Env;
use std::env;
use std::io::{self, Write};
use std::time::Instant;
use tribes::console::execute;
use tribes::{App, Config};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let mut config = Config::from_env();
    if let Some(dir) = env::args().nth(1) {
        config = config.with_data_dir(dir);
    }
    let mut app = App::new(config);

    println!("Type 'login <code>' to start, 'help' for commands.");
    let mut start_time = Instant::now();
    let mut status = String::from("ok");
    loop {
        let elapsed = start_time.elapsed().as_secs_f64();
        print!("[{:.1}] ({}) > ", elapsed, status);
        io::stdout().flush()?;

        let mut command = String::new();
        if io::stdin().read_line(&mut command)? == 0 {
            break;
        }
        start_time = Instant::now();

        let outcome = execute(&mut app, command.trim());
        for line in &outcome.lines {
            println!("{}", line);
        }
        if outcome.quit {
            break;
        }
        status = outcome.status;
    }

    Ok(())
}
