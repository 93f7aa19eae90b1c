use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// Фильтр по умолчанию, если RUST_LOG не задан
const DEFAULT_FILTER: &str = "warn,tts_reader=info";

/// Инициализировать логгер. `verbose` поднимает уровень библиотеки до debug.
pub fn init_logger(verbose: bool) {
    let env = Env::default().filter_or("RUST_LOG", DEFAULT_FILTER);
    let mut builder = Builder::from_env(env);

    // Шум HTTP-клиента нужен только при явном RUST_LOG
    builder
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("hyper_util", LevelFilter::Error)
        .filter_module("mio", LevelFilter::Error);

    if verbose {
        builder
            .filter_module("tts_reader", LevelFilter::Debug)
            .filter_module("reqwest", LevelFilter::Debug);
    }

    let result = builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .try_init();

    if let Err(e) = result {
        eprintln!("Logger is already initialized: {}", e);
    }
}
