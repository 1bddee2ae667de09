use clap::{App, Arg};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use rand::Rng;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tsae::config::Config;
use tsae::id::ParticipantId;
use tsae::operation::Payload;
use tsae::run::ReplicaHandle;
use tsae::store::KVStore;

const LIST_SEP: &str = ",";
const ADDRESS_SEP: &str = "=";

const DEFAULT_IP: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TCP_NODELAY: bool = true;
const DEFAULT_TCP_BUFFER_SIZE: usize = 8 * 1024; // 8 KBs
const DEFAULT_SESSION_INTERVAL: u64 = 1000; // millis

// local writes pick one of these many keys
const SUBMIT_KEYS: usize = 100;

struct Args {
    config: Config,
    ip: IpAddr,
    port: u16,
    participants: Vec<(ParticipantId, String)>,
    submit_interval: Option<Duration>,
    log_file: Option<String>,
    cpus: Option<usize>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = parse_args()?;

    // the guard flushes the log file when dropped
    let _guard = init_tracing(args.log_file.as_deref())?;
    tokio_runtime(args.cpus)?.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    // resolve the address of each partner
    let mut addresses = Vec::with_capacity(args.participants.len());
    for (id, address) in args.participants {
        if &id == args.config.id() {
            continue;
        }
        let resolved = tokio::net::lookup_host(address.as_str())
            .await
            .wrap_err_with(|| format!("resolving {}", address))?
            .next()
            .ok_or_else(|| eyre!("no address found for {}", address))?;
        addresses.push((id, resolved));
    }

    let handle = tsae::run::replica(
        args.config,
        args.ip,
        args.port,
        addresses,
        KVStore::new(),
    )
    .await
    .map_err(|e| eyre!("starting replica: {}", e))?;

    // maybe start local writes
    if let Some(interval) = args.submit_interval {
        let replica = handle.replica().clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                let key = rand::thread_rng().gen_range(0..SUBMIT_KEYS);
                let payload = Payload::Add {
                    key: format!("key{}", key),
                    value: replica.id().clone(),
                };
                replica.submit(payload);
            }
        });
    }

    tokio::signal::ctrl_c()
        .await
        .wrap_err("waiting for ctrl-c")?;
    dump(&handle);
    handle.shutdown();
    Ok(())
}

fn dump(handle: &ReplicaHandle<KVStore>) {
    let replica = handle.replica();
    let log = replica.log();
    tracing::info!(
        "[replica {}] summary: {} | store: {} keys | log: {} ops",
        replica.id(),
        replica.summary(),
        replica.inspect(|store| store.len()),
        log.len()
    );
    tracing::info!("[replica {}] ack:\n{}", replica.id(), replica.ack());
    tracing::debug!("[replica {}] log:\n{}", replica.id(), log);
}

fn parse_args() -> Result<Args> {
    let matches = App::new("replica")
        .version("0.1")
        .about(
            "Runs a replica that exchanges operations with its partners \
             through anti-entropy sessions.",
        )
        .arg(
            Arg::with_name("id")
                .long("id")
                .value_name("ID")
                .help("replica identifier")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("participants")
                .long("participants")
                .value_name("PARTICIPANTS")
                .help(
                    "comma-separated list of 'ID=HOST:PORT', one per replica \
                     in the group; the entry of this replica (if any) is only \
                     used to define the group",
                )
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("ip")
                .long("ip")
                .value_name("IP")
                .help("ip to bind to; default: 127.0.0.1")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("port")
                .long("port")
                .value_name("PORT")
                .help("port to bind to; default: 3000")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("session_interval")
                .long("session_interval")
                .value_name("SESSION_INTERVAL")
                .help(
                    "number indicating the interval (in milliseconds) between \
                     sessions started by this replica; if 0, this replica only \
                     answers to sessions started by others; default: 1000",
                )
                .takes_value(true),
        )
        .arg(
            Arg::with_name("session_timeout")
                .long("session_timeout")
                .value_name("SESSION_TIMEOUT")
                .help(
                    "number indicating the time (in milliseconds) after which \
                     a session is aborted; by default, sessions are not \
                     bounded",
                )
                .takes_value(true),
        )
        .arg(
            Arg::with_name("no_purge")
                .long("no_purge")
                .help(
                    "if set, operations known by all replicas are kept in the \
                     log",
                ),
        )
        .arg(
            Arg::with_name("tcp_nodelay")
                .long("tcp_nodelay")
                .value_name("TCP_NODELAY")
                .help("set TCP_NODELAY; default: true")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("tcp_buffer_size")
                .long("tcp_buffer_size")
                .value_name("TCP_BUFFER_SIZE")
                .help("size of the TCP buffer; default: 8192 (bytes)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("submit_interval")
                .long("submit_interval")
                .value_name("SUBMIT_INTERVAL")
                .help(
                    "number indicating the interval (in milliseconds) between \
                     local writes on random keys; by default, there are no \
                     local writes",
                )
                .takes_value(true),
        )
        .arg(
            Arg::with_name("log_file")
                .long("log_file")
                .value_name("LOG_FILE")
                .help(
                    "file to which logging output is written; by default, \
                     output goes to stdout",
                )
                .takes_value(true),
        )
        .arg(
            Arg::with_name("cpus")
                .long("cpus")
                .value_name("CPUS")
                .help(
                    "number of cpus to be used by tokio; by default all \
                     available cpus are used",
                )
                .takes_value(true),
        )
        .get_matches();

    // parse arguments
    let id = matches
        .value_of("id")
        .ok_or_else(|| eyre!("id should be set"))?
        .to_string();
    let participants = parse_participants(matches.value_of("participants"))?;
    let ip = parse_ip(matches.value_of("ip"))?;
    let port = parse_port(matches.value_of("port"))?;
    let session_interval =
        parse_session_interval(matches.value_of("session_interval"))?;
    let session_timeout =
        parse_millis(matches.value_of("session_timeout"), "session timeout")?;
    let purge = !matches.is_present("no_purge");
    let tcp_nodelay = parse_tcp_nodelay(matches.value_of("tcp_nodelay"))?;
    let tcp_buffer_size =
        parse_tcp_buffer_size(matches.value_of("tcp_buffer_size"))?;
    let submit_interval =
        parse_millis(matches.value_of("submit_interval"), "submit interval")?;
    let log_file = matches.value_of("log_file").map(String::from);
    let cpus = parse_cpus(matches.value_of("cpus"))?;

    // create config
    let ids = participants.iter().map(|(id, _)| id.clone());
    let mut config = Config::new(id, ids);
    config.set_session_interval(session_interval);
    config.set_session_timeout(session_timeout);
    config.set_purge(purge);
    config.set_tcp_nodelay(tcp_nodelay);
    config.set_tcp_buffer_size(tcp_buffer_size);

    tracing::debug!("config: {:?}", config);
    Ok(Args {
        config,
        ip,
        port,
        participants,
        submit_interval,
        log_file,
        cpus,
    })
}

fn parse_participants(
    participants: Option<&str>,
) -> Result<Vec<(ParticipantId, String)>> {
    participants
        .ok_or_else(|| eyre!("participants should be set"))?
        .split(LIST_SEP)
        .map(|entry| {
            let mut parts = entry.splitn(2, ADDRESS_SEP);
            match (parts.next(), parts.next()) {
                (Some(id), Some(address)) if !id.is_empty() => {
                    Ok((id.to_string(), address.to_string()))
                }
                _ => Err(eyre!(
                    "participant '{}' should be of the form ID=HOST:PORT",
                    entry
                )),
            }
        })
        .collect()
}

fn parse_ip(ip: Option<&str>) -> Result<IpAddr> {
    ip.unwrap_or(DEFAULT_IP)
        .parse::<IpAddr>()
        .wrap_err("ip should be a valid ip address")
}

fn parse_port(port: Option<&str>) -> Result<u16> {
    port.map(|port| port.parse::<u16>().wrap_err("port should be a number"))
        .unwrap_or(Ok(DEFAULT_PORT))
}

fn parse_session_interval(interval: Option<&str>) -> Result<Option<Duration>> {
    let millis = interval
        .map(|interval| {
            interval
                .parse::<u64>()
                .wrap_err("session interval should be a number")
        })
        .unwrap_or(Ok(DEFAULT_SESSION_INTERVAL))?;
    // 0 disables the scheduler
    Ok(Some(millis)
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis))
}

fn parse_millis(millis: Option<&str>, what: &str) -> Result<Option<Duration>> {
    millis
        .map(|millis| {
            millis
                .parse::<u64>()
                .map(Duration::from_millis)
                .wrap_err_with(|| format!("{} should be a number", what))
        })
        .transpose()
}

fn parse_tcp_nodelay(tcp_nodelay: Option<&str>) -> Result<bool> {
    tcp_nodelay
        .map(|tcp_nodelay| {
            tcp_nodelay
                .parse::<bool>()
                .wrap_err("tcp_nodelay should be a boolean")
        })
        .unwrap_or(Ok(DEFAULT_TCP_NODELAY))
}

fn parse_tcp_buffer_size(buffer_size: Option<&str>) -> Result<usize> {
    buffer_size
        .map(|buffer_size| {
            buffer_size
                .parse::<usize>()
                .wrap_err("buffer size should be a number")
        })
        .unwrap_or(Ok(DEFAULT_TCP_BUFFER_SIZE))
}

fn parse_cpus(cpus: Option<&str>) -> Result<Option<usize>> {
    cpus.map(|cpus| {
        let cpus = cpus.parse::<usize>().wrap_err("cpus should be a number")?;
        // tokio panics when asked for zero worker threads
        if cpus == 0 {
            return Err(eyre!("cpus should be at least 1"));
        }
        Ok(cpus)
    })
    .transpose()
}

fn init_tracing(log_file: Option<&str>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(log_file) => {
            let path = Path::new(log_file);
            let file_name = path.file_name().ok_or_else(|| {
                eyre!("log file '{}' should name a file", log_file)
            })?;
            let directory = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let appender =
                tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}

fn tokio_runtime(cpus: Option<usize>) -> Result<tokio::runtime::Runtime> {
    // get number of cpus
    let available = num_cpus::get();
    let cpus = cpus.unwrap_or(available);
    tracing::info!("cpus: {} of {}", cpus, available);

    // create tokio runtime
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cpus)
        .enable_all()
        .thread_name("replica")
        .build()
        .wrap_err("tokio runtime build should work")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpus() {
        assert_eq!(parse_cpus(None).unwrap(), None);
        assert_eq!(parse_cpus(Some("4")).unwrap(), Some(4));
        assert!(parse_cpus(Some("four")).is_err());
        // zero worker threads would make the runtime builder panic
        let e = parse_cpus(Some("0")).unwrap_err();
        assert_eq!(e.to_string(), "cpus should be at least 1");
    }

    #[test]
    fn participants() {
        let parsed = parse_participants(Some("A=127.0.0.1:3000,B=host:3001"))
            .unwrap();
        assert_eq!(
            parsed,
            vec![
                (String::from("A"), String::from("127.0.0.1:3000")),
                (String::from("B"), String::from("host:3001")),
            ]
        );
        assert!(parse_participants(Some("A")).is_err());
        assert!(parse_participants(Some("=host:3000")).is_err());
        assert!(parse_participants(None).is_err());
    }

    #[test]
    fn session_interval() {
        let default = Duration::from_millis(DEFAULT_SESSION_INTERVAL);
        assert_eq!(parse_session_interval(None).unwrap(), Some(default));
        // 0 only answers to sessions started by others
        assert_eq!(parse_session_interval(Some("0")).unwrap(), None);
        let ten = Duration::from_millis(10);
        assert_eq!(parse_session_interval(Some("10")).unwrap(), Some(ten));
    }
}
