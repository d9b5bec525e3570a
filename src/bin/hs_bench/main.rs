mod workers;

use std::{
    error::Error,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Instant,
};

use clap::{Parser, ValueEnum};
use encoding_rs::Encoding;
use hsclient::{
    Command, CompareOperator, Find, IndexDescriptor, Pool, PoolConfig, PoolError, QueryResult,
};
use log::{debug, error, info};

use workers::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Phase {
    Insert,
    Update,
    Query,
    Delete,
}

#[derive(Debug, Parser)]
#[command(version, about = "Throughput benchmark for a HandlerSocket server", long_about = None)]
struct Cli {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Authentication secret
    #[arg(long, default_value = "")]
    secret: String,
    /// Database holding the benchmark table
    #[arg(long, default_value = "waf")]
    db: String,
    #[arg(long, default_value = "t_user")]
    table: String,
    /// Number of caller threads
    #[arg(short, long, default_value_t = 4)]
    threads: usize,
    /// Number of pooled connections
    #[arg(short, long, default_value_t = 120)]
    pool_size: usize,
    /// Keys per caller thread
    #[arg(short = 'n', long, default_value_t = 2000)]
    count: usize,
    /// Commands per batch
    #[arg(short = 'l', long = "loop", default_value_t = 10)]
    batch: usize,
    /// Text encoding of the table (any WHATWG label)
    #[arg(long, default_value = "utf-8")]
    encoding: String,
    /// Phases to run, in order
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_value = "insert,update,query,delete"
    )]
    phases: Vec<Phase>,
}

struct Bench {
    pool: Pool,
    insert_index: Arc<IndexDescriptor>,
    update_index: Arc<IndexDescriptor>,
    phases: Vec<Phase>,
    count: usize,
    batch: usize,
    stop: Arc<AtomicBool>,
    completed: AtomicUsize,
    failed: AtomicUsize,
    wrong: AtomicUsize,
}

impl Bench {
    fn run(&self, caller: usize) {
        let prefix = format!("a{}", caller * self.count);
        debug!("caller {caller} started");

        for &phase in &self.phases {
            for i in 0..self.count {
                if self.stop.load(Ordering::Relaxed) {
                    info!("caller {caller} interrupted");
                    return;
                }
                let base = format!("{prefix}{i}_");
                let outcome = match phase {
                    Phase::Insert => self.insert(&base),
                    Phase::Update => self.update(&base),
                    Phase::Query => self.query(&base),
                    Phase::Delete => self.delete(&base),
                };
                if let Err(e) = outcome {
                    error!("caller {caller}: {phase:?} failed: {e}");
                    return;
                }
            }
        }
        debug!("caller {caller} finished");
    }

    fn keys(&self, base: &str) -> impl Iterator<Item = String> {
        (0..self.batch).map(move |j| format!("{base}{j:03}"))
    }

    fn insert(&self, base: &str) -> Result<(), PoolError> {
        let commands: Vec<Command> = self
            .keys(base)
            .map(|s| {
                let email = format!("{s}@xxx.com");
                Command::insert(&[s.clone(), email, s, "2014-01-01".into()])
            })
            .collect();
        self.record(&self.pool.execute(&self.insert_index, commands)?.wait());
        Ok(())
    }

    fn update(&self, base: &str) -> Result<(), PoolError> {
        let commands: Vec<Command> = self
            .keys(base)
            .map(|s| {
                Find::new(CompareOperator::Eq, &[s.as_str()])
                    .update(&[format!("n{s}@xxx.com"), s.clone()])
                    .into()
            })
            .collect();
        self.record(&self.pool.execute(&self.update_index, commands)?.wait());
        Ok(())
    }

    // one find per batch so every result can be checked against its key
    fn query(&self, base: &str) -> Result<(), PoolError> {
        for s in self.keys(base) {
            let find = Find::new(CompareOperator::Eq, &[s.as_str()]).limit(10);
            let results = self.pool.execute_one(&self.update_index, find)?.wait();
            self.record(&results);

            let matches = results
                .first()
                .and_then(QueryResult::rows)
                .and_then(|rows| rows.row(0))
                .and_then(|row| row.str_by_name("password").ok().flatten())
                .is_some_and(|password| password == s);
            if !matches {
                self.wrong.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn delete(&self, base: &str) -> Result<(), PoolError> {
        let commands: Vec<Command> = self
            .keys(base)
            .map(|s| Find::new(CompareOperator::Eq, &[s.as_str()]).delete().into())
            .collect();
        self.record(&self.pool.execute(&self.update_index, commands)?.wait());
        Ok(())
    }

    fn record(&self, results: &[QueryResult]) {
        self.completed.fetch_add(results.len(), Ordering::Relaxed);
        for result in results.iter().filter(|r| !r.is_ok()) {
            debug!("{result}");
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

    let encoding = Encoding::for_label(cli.encoding.as_bytes())
        .ok_or_else(|| format!("unknown encoding '{}'", cli.encoding))?;
    let config = PoolConfig::new(cli.host.as_str(), cli.secret.as_str())
        .pool_size(cli.pool_size)
        .encoding(encoding);
    let pool = Pool::connect(config)?;

    let update_index = Arc::new(IndexDescriptor::new(
        &cli.db,
        &cli.table,
        "PRIMARY",
        &["email", "password", "createTime"],
    ));
    let insert_index = Arc::new(IndexDescriptor::new(
        &cli.db,
        &cli.table,
        "PRIMARY",
        &["account", "email", "password", "createTime"],
    ));
    pool.open_index(&update_index)?;
    pool.open_index(&insert_index)?;

    let bench = Arc::new(Bench {
        pool,
        insert_index,
        update_index,
        phases: cli.phases,
        count: cli.count,
        batch: cli.batch,
        stop,
        completed: AtomicUsize::new(0),
        failed: AtomicUsize::new(0),
        wrong: AtomicUsize::new(0),
    });

    let started = Instant::now();
    {
        let workers = WorkerPool::new(cli.threads);
        for caller in 0..cli.threads {
            let bench = Arc::clone(&bench);
            workers.execute(move || bench.run(caller));
        }
    }
    let elapsed = started.elapsed();

    let completed = bench.completed.load(Ordering::Relaxed);
    println!("commands: {completed} in {elapsed:?}");
    println!(
        "failed: {}, wrong query results: {}",
        bench.failed.load(Ordering::Relaxed),
        bench.wrong.load(Ordering::Relaxed)
    );
    println!("speed = {:.0} commands/s", completed as f64 / elapsed.as_secs_f64().max(1e-9));

    if let Ok(bench) = Arc::try_unwrap(bench) {
        bench.pool.close();
    }
    Ok(())
}
