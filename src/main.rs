use sum_bench::{harness, host, input, Error, GpuContext, Strategy, SumBuffers, SumKernels};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

struct Config {
    n: usize,
    iters: usize,
    seed: u64,
    cpu_only: bool,
}

fn print_usage() {
    eprintln!("Usage: sum-bench [OPTIONS]");
    eprintln!();
    eprintln!("  --n <count>        Elements to sum (default: 100000000)");
    eprintln!("  --iters <n>        Timed iterations per runner (default: 10)");
    eprintln!("  --seed <n>         Input generator seed (default: 42)");
    eprintln!("  --cpu-only         Skip the device strategies");
    eprintln!("  --help             Show this help");
}

fn main() {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off")),
                ),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config = Config {
        n: 100_000_000,
        iters: 10,
        seed: 42,
        cpu_only: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--n" => {
                i += 1;
                if i < args.len() {
                    config.n = args[i].parse().unwrap_or(config.n);
                }
            }
            "--iters" => {
                i += 1;
                if i < args.len() {
                    config.iters = args[i].parse().unwrap_or(config.iters);
                }
            }
            "--seed" => {
                i += 1;
                if i < args.len() {
                    config.seed = args[i].parse().unwrap_or(config.seed);
                }
            }
            "--cpu-only" => {
                config.cpu_only = true;
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            other => {
                eprintln!("Unknown flag: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    if let Err(e) = run(&config) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), Error> {
    let values = input::generate(config.n, config.seed);
    let reference = host::sum_sequential(&values);

    let cpu = harness::run("CPU", config.iters, config.n, reference, || {
        host::sum_sequential(&values)
    })?;
    harness::print_report(&cpu);

    let cpu_par = harness::run("CPU threads", config.iters, config.n, reference, || {
        host::sum_parallel(&values)
    })?;
    harness::print_report(&cpu_par);

    if config.cpu_only {
        return Ok(());
    }

    let ctx = GpuContext::new()?;
    let buffers = SumBuffers::upload(&ctx, &values)?;
    let kernels = SumKernels::new(&ctx, &buffers);

    for strategy in Strategy::ALL {
        let name = format!("GPU <{}>", strategy.entry_point());
        let report = harness::run(&name, config.iters, config.n, reference, || {
            buffers.reset_total(&ctx);
            kernels.execute(&ctx, &buffers, strategy)
        })?;
        harness::print_report(&report);
    }

    Ok(())
}
