#[macro_use]
extern crate clap;

use clap::{App, Arg};
use log::{error, info, warn};
use phasespace::rng::entropy_seed;
use phasespace::{Events, Location, PhaseSpaceError, RunCard};
use std::process;
use std::time::Instant;

/// Weighted mean, minimum and maximum of a Dalitz variable.
fn summarize(name: &str, values: &[f64], weights: &[f64]) {
    let (mut min, mut max) = (std::f64::INFINITY, std::f64::NEG_INFINITY);
    let (mut sum_w, mut sum_wv) = (0., 0.);
    for (v, w) in values.iter().zip(weights) {
        if *w > 0. {
            min = min.min(*v);
            max = max.max(*v);
            sum_w += w;
            sum_wv += w * v;
        }
    }

    if sum_w > 0. {
        println!(
            "{:<12} mean = {:.6}, range = [{:.6}, {:.6}]",
            name,
            sum_wv / sum_w,
            min,
            max
        );
    }
}

fn run(card: &RunCard) -> Result<(), PhaseSpaceError> {
    if card.n_threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(card.n_threads)
            .build_global()
        {
            warn!("could not size the thread pool: {}", e);
        }
    }
    info!("running on {} threads", rayon::current_num_threads());

    let seed = card.seed.unwrap_or_else(entropy_seed);
    info!("seed {}", seed);

    let phsp = card.phase_space(seed)?;
    let mother = phsp.decay().mother_at_rest();
    let n = phsp.decay().n_daughters();

    let mut events = Events::new(n, card.n_events, Location::Device);
    let now = Instant::now();
    let summary = phsp.generate(&mother, &mut events, seed)?;
    info!("Generating | Time = {:#?}", now.elapsed());

    let now = Instant::now();
    let host = events.copy_to(Location::Host)?;
    drop(events);
    info!("Copying to host | Time = {:#?}", now.elapsed());

    println!("events       {}", host.len());
    println!("sum weights  {:e}", host.sum_of_weights());
    println!("max weight   {:e}", host.max_weight());
    println!("zero weights {}", host.count_zero_weights());
    if card.unweighted {
        println!("above max    {}", summary.above_max_weight);
        println!("given up     {}", summary.given_up);
    }

    if n == 3 {
        let m12_sq = host.map(|e| (e.daughters[1] + e.daughters[2]).square());
        let m02_sq = host.map(|e| (e.daughters[0] + e.daughters[2]).square());
        summarize("M^2(d1 d2)", &m12_sq, host.weights());
        summarize("M^2(d0 d2)", &m02_sq, host.weights());
    }

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = App::new("phsp")
        .version("0.1")
        .about("Generate N-body phase-space events")
        .arg(
            Arg::with_name("card")
                .long("card")
                .value_name("RUNCARD")
                .help("YAML run card, defaults to Lambda_c+ -> p K- pi+"),
        )
        .arg(
            Arg::with_name("events")
                .short("n")
                .long("events")
                .value_name("EVENTS")
                .help("Number of events to generate"),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .value_name("SEED")
                .help("Specify the generation seed"),
        )
        .arg(
            Arg::with_name("cores")
                .short("c")
                .long("cores")
                .value_name("NUMCORES")
                .help("Set the number of cores"),
        )
        .arg(
            Arg::with_name("unweighted")
                .long("unweighted")
                .help("Produce unit-weight events by hit-or-miss"),
        )
        .get_matches();

    let mut card = match matches.value_of("card") {
        Some(filename) => match RunCard::from_file(filename) {
            Ok(card) => card,
            Err(e) => {
                error!("{}: {}", filename, e);
                process::exit(1);
            }
        },
        None => RunCard::default(),
    };

    if matches.is_present("events") {
        card.n_events = value_t!(matches, "events", usize).unwrap_or_else(|e| e.exit());
    }

    if matches.is_present("seed") {
        card.seed = Some(value_t!(matches, "seed", u64).unwrap_or_else(|e| e.exit()));
    }

    if matches.is_present("cores") {
        card.n_threads = value_t!(matches, "cores", usize).unwrap_or_else(|e| e.exit());
    }

    if matches.is_present("unweighted") {
        card.unweighted = true;
    }

    if let Err(e) = run(&card) {
        error!("{}", e);
        process::exit(1);
    }
}
