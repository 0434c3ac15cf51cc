use clap::{App, Arg};
use ibdhmm::gen_seq::{simulate_pair, PROFILE};
use ibdhmm::dispatch::{Completed, Dispatcher, PoolConfig, TaskKind, TaskOutput, WorkerPool};
use ibdhmm::hmm::{CoancestryDecay, IbdHmm, Parameters, State};
use ibdhmm::optim::{BfgsConfig, BoundedBfgs};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
#[macro_use]
extern crate log;

fn app() -> App<'static, 'static> {
    App::new("ibdhmm")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Simulate pairs, fit (F,aa), and call IBD tracts. Simulated pairs -> TSV")
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Debug mode"),
        )
        .arg(
            Arg::with_name("pairs")
                .long("pairs")
                .short("p")
                .takes_value(true)
                .default_value("4")
                .help("Number of pairs to simulate."),
        )
        .arg(
            Arg::with_name("length")
                .long("length")
                .short("l")
                .takes_value(true)
                .default_value("10000")
                .help("Number of sites for each pair."),
        )
        .arg(
            Arg::with_name("F")
                .long("F")
                .takes_value(true)
                .default_value("0.3")
                .help("True IBD fraction."),
        )
        .arg(
            Arg::with_name("aa")
                .long("aa")
                .takes_value(true)
                .default_value("0.1")
                .help("True switching rate."),
        )
        .arg(
            Arg::with_name("init_F")
                .long("init_F")
                .takes_value(true)
                .default_value("0.5")
                .help("Initial value of F in the optimization."),
        )
        .arg(
            Arg::with_name("init_aa")
                .long("init_aa")
                .takes_value(true)
                .default_value("0.5")
                .help("Initial value of aa in the optimization."),
        )
        .arg(
            Arg::with_name("max_iter")
                .long("max_iter")
                .takes_value(true)
                .default_value("200")
                .help("Maximum number of iterations in the optimization."),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .takes_value(true)
                .default_value("32389")
                .help("Seed"),
        )
        .arg(
            Arg::with_name("threads")
                .long("threads")
                .short("t")
                .takes_value(true)
                .default_value("1")
                .help("Number of threads"),
        )
        .arg(
            Arg::with_name("queue_capacity")
                .long("queue_capacity")
                .takes_value(true)
                .default_value("1024")
                .help("Maximum number of queued tasks."),
        )
}

fn parse<T: std::str::FromStr>(matches: &clap::ArgMatches, name: &str) -> std::io::Result<T> {
    matches
        .value_of(name)
        .and_then(|e| e.parse().ok())
        .ok_or_else(|| {
            let msg = format!("Could not parse --{}", name);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, msg)
        })
}

// Dispatch errors are fatal.
fn abort(why: ibdhmm::DispatchError) -> ! {
    error!("{}", why);
    eprintln!("[ibdhmm] ERROR: {}", why);
    std::process::exit(1);
}

fn main() -> std::io::Result<()> {
    let matches = app().get_matches();
    let level = match matches.occurrences_of("verbose") {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    let pairs: usize = parse(&matches, "pairs")?;
    let length: usize = parse(&matches, "length")?;
    let truth = Parameters::new(parse(&matches, "F")?, parse(&matches, "aa")?);
    let init = Parameters::new(parse(&matches, "init_F")?, parse(&matches, "init_aa")?);
    let max_iter: usize = parse(&matches, "max_iter")?;
    let seed: u64 = parse(&matches, "seed")?;
    let threads: usize = parse(&matches, "threads")?;
    let config = PoolConfig::new(threads, parse(&matches, "queue_capacity")?);
    if !(0f64..=1f64).contains(&truth.f) || !(0f64..=1f64).contains(&truth.aa) {
        let msg = format!("Parameters should be in [0,1]:{}", truth);
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, msg));
    }
    debug!("Start");
    let kernel = CoancestryDecay::default();
    let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(seed);
    let simulated: Vec<_> = (0..pairs)
        .map(|_| simulate_pair(&mut rng, length, &truth, &kernel, &PROFILE))
        .collect();
    let minimizer = BoundedBfgs::new(BfgsConfig {
        max_iter,
        ..BfgsConfig::default()
    });
    let pool = WorkerPool::new(&config);
    info!("Threads:{}", pool.threads());
    let dispatcher = Dispatcher::new(pool, IbdHmm::with_kernel(kernel), Arc::new(minimizer));
    let sequences: Vec<_> = simulated.iter().map(|p| Arc::new(p.sequence.clone())).collect();
    let params: Vec<_> = (0..pairs).map(|_| Arc::new(Mutex::new(init))).collect();
    // Fit the parameters of each pair.
    let (tx, rx) = channel();
    for (id, (seq, params)) in sequences.iter().zip(params.iter()).enumerate() {
        let code = TaskKind::Optimize as u8;
        if let Err(why) = dispatcher.submit_task(code, id, seq.clone(), params, tx.clone()) {
            abort(why);
        }
    }
    drop(tx);
    for Completed { id, output } in rx.iter() {
        match output {
            Ok(TaskOutput::Optimize { params }) => debug!("FIT\t{}\t{}", id, params),
            Ok(_) => {}
            Err(why) => abort(why),
        }
    }
    if let Err(why) = dispatcher.executor().join() {
        abort(why);
    }
    // Then, compute the likelihood and the IBD tracts by the fitted parameters.
    let (tx, rx) = channel();
    for (id, (seq, params)) in sequences.iter().zip(params.iter()).enumerate() {
        for kind in [TaskKind::Forward, TaskKind::Viterbi] {
            let reply = tx.clone();
            if let Err(why) = dispatcher.submit_task(kind as u8, id, seq.clone(), params, reply) {
                abort(why);
            }
        }
    }
    drop(tx);
    let mut lks = vec![f64::NAN; pairs];
    let mut paths = vec![vec![]; pairs];
    for Completed { id, output } in rx.iter() {
        match output {
            Ok(TaskOutput::Forward { lk, .. }) => lks[id] = lk,
            Ok(TaskOutput::Viterbi { path, .. }) => paths[id] = path,
            Ok(_) => {}
            Err(why) => abort(why),
        }
    }
    if let Err(why) = dispatcher.executor().shutdown() {
        abort(why);
    }
    println!("ID\tTRUE_F\tTRUE_AA\tFIT_F\tFIT_AA\tLK\tIBD_FRAC\tACCURACY");
    for (id, pair) in simulated.iter().enumerate() {
        let fit = match params[id].lock() {
            Ok(fit) => *fit,
            Err(_) => abort(ibdhmm::DispatchError::LockFailure),
        };
        let path: &[State] = &paths[id];
        let ibd = path.iter().skip(1).filter(|&&s| s == State::Ibd).count();
        let correct = path
            .iter()
            .zip(pair.states.iter())
            .skip(1)
            .filter(|(x, y)| x == y)
            .count();
        let (ibd, correct) = (ibd as f64 / length as f64, correct as f64 / length as f64);
        println!(
            "{}\t{:.3}\t{:.3}\t{:.4}\t{:.4}\t{:.3}\t{:.3}\t{:.3}",
            id, truth.f, truth.aa, fit.f, fit.aa, lks[id], ibd, correct
        );
    }
    Ok(())
}
