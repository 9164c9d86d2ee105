use clap::{
    crate_authors, crate_description, crate_name, crate_version, App, AppSettings, Arg,
    ArgMatches, SubCommand,
};
use pregel::{
    computations::{ConnectedComponents, PageRank, ShortestPaths},
    graph::{CsrGraph, Graph, Orientation},
    progress::LoggingProgressTracker,
    schema::ValueType,
    Pregel, PregelComputation, PregelConfig, PregelResult,
};
use rayon::ThreadPoolBuilder;
use std::{
    error::Error,
    fs::File,
    io::{BufReader, BufWriter, Write},
    sync::Arc,
};

fn config(matches: &ArgMatches) -> Result<PregelConfig, Box<dyn Error>> {
    Ok(PregelConfig::builder()
        .max_iterations(matches.value_of("max-iterations").unwrap().parse()?)
        .concurrency(matches.value_of("concurrency").unwrap().parse()?)
        .is_asynchronous(matches.is_present("async"))
        .use_fork_join(matches.is_present("fork-join"))
        .check_memory(!matches.is_present("no-memory-check"))
        .build()?)
}

fn run<C: PregelComputation>(
    graph: &CsrGraph,
    config: PregelConfig,
    computation: C,
) -> Result<PregelResult, Box<dyn Error>> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.concurrency())
        .build()?;
    eprintln!("{}", Pregel::<_, C>::progress_task(graph, &config, "Pregel"));
    let progress = Arc::new(LoggingProgressTracker::new("Pregel", graph.node_count()));
    let pregel = Pregel::create(graph, config, computation, &pool, progress)?;
    Ok(pregel.run()?)
}

fn write_result(result: &PregelResult) -> Result<(), Box<dyn Error>> {
    let values = result.node_values();
    let keys = result.public_keys();
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    writeln!(out, "node\t{}", keys.join("\t"))?;
    for node in 0..values.node_count() {
        write!(out, "{}", node)?;
        for key in &keys {
            match values.value_type(key)? {
                ValueType::Double => write!(out, "\t{}", values.double_value(key, node)?)?,
                ValueType::Long => write!(out, "\t{}", values.long_value(key, node)?)?,
                ValueType::DoubleArray => {
                    write!(out, "\t{:?}", values.double_array_value(key, node)?)?
                }
                ValueType::LongArray => write!(out, "\t{:?}", values.long_array_value(key, node)?)?,
            }
        }
        writeln!(out)?;
    }
    eprintln!(
        "ran {} iterations, converged: {}",
        result.ran_iterations(),
        result.did_converge()
    );
    Ok(())
}

fn handle_run(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let algorithm = matches.value_of("algorithm").unwrap();
    let orientation = if algorithm == "wcc" || matches.is_present("undirected") {
        Orientation::Undirected
    } else {
        Orientation::Natural
    };
    let graph = CsrGraph::read_edge_list(
        BufReader::new(File::open(matches.value_of("GRAPH").unwrap())?),
        orientation,
    )?;
    let config = config(matches)?;
    let result = match algorithm {
        "pagerank" => run(
            &graph,
            config,
            PageRank::new(matches.value_of("damping-factor").unwrap().parse()?),
        )?,
        "wcc" => run(&graph, config, ConnectedComponents)?,
        "sssp" => run(
            &graph,
            config,
            ShortestPaths::new(matches.value_of("source").unwrap().parse()?),
        )?,
        _ => unreachable!(),
    };
    write_result(&result)
}

fn estimate<C: PregelComputation>(
    matches: &ArgMatches,
    computation: C,
) -> Result<(), Box<dyn Error>> {
    let config = config(matches)?;
    let node_count = matches.value_of("nodes").unwrap().parse()?;
    let schema = computation.schema(&config);
    schema.validate()?;
    let tree = Pregel::<CsrGraph, C>::memory_estimation(
        &schema,
        computation.reducer().is_none(),
        config.is_asynchronous(),
    )
    .estimate(node_count, config.concurrency());
    println!("{}", tree);
    Ok(())
}

fn handle_estimate(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    match matches.value_of("algorithm").unwrap() {
        "pagerank" => estimate(matches, PageRank::default()),
        "wcc" => estimate(matches, ConnectedComponents),
        "sssp" => estimate(matches, ShortestPaths::new(0)),
        _ => unreachable!(),
    }
}

fn config_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    vec![
        Arg::with_name("algorithm")
            .help("The computation to run")
            .long("algorithm")
            .short("a")
            .takes_value(true)
            .default_value("pagerank")
            .possible_values(&["pagerank", "wcc", "sssp"]),
        Arg::with_name("max-iterations")
            .help("Maximum number of supersteps")
            .long("max-iterations")
            .takes_value(true)
            .default_value("20"),
        Arg::with_name("concurrency")
            .help("Number of worker threads")
            .long("concurrency")
            .takes_value(true)
            .default_value("4"),
        Arg::with_name("async")
            .help("Uses the async queue messenger when there is no reducer")
            .long("async")
            .takes_value(false),
        Arg::with_name("fork-join")
            .help("Uses fork/join compute steps")
            .long("fork-join")
            .takes_value(false),
        Arg::with_name("no-memory-check")
            .help("Skips the available memory check")
            .long("no-memory-check")
            .takes_value(false),
    ]
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let matches = App::new(crate_name!())
        .about(crate_description!())
        .author(crate_authors!())
        .version(crate_version!())
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("run")
                .about("Runs a computation over an edge list")
                .after_help(
                    r"The edge list holds one relationship per line:

  src dst [weight]

Lines starting with '#' are ignored.",
                )
                .arg(Arg::with_name("GRAPH").required(true))
                .args(&config_args())
                .arg(
                    Arg::with_name("undirected")
                        .help("Loads every edge in both directions")
                        .long("undirected")
                        .takes_value(false),
                )
                .arg(
                    Arg::with_name("damping-factor")
                        .long("damping-factor")
                        .takes_value(true)
                        .default_value("0.85"),
                )
                .arg(
                    Arg::with_name("source")
                        .help("Source node of sssp")
                        .long("source")
                        .takes_value(true)
                        .default_value("0"),
                ),
        )
        .subcommand(
            SubCommand::with_name("estimate")
                .about("Displays the memory estimate of a computation")
                .arg(
                    Arg::with_name("nodes")
                        .long("nodes")
                        .takes_value(true)
                        .required(true),
                )
                .args(&config_args()),
        )
        .get_matches();
    if let Some(matches) = matches.subcommand_matches("run") {
        handle_run(matches)?;
    } else if let Some(matches) = matches.subcommand_matches("estimate") {
        handle_estimate(matches)?;
    }
    Ok(())
}
