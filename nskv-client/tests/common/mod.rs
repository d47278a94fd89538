//! In-process RESP2 server used by the integration tests.
//!
//! Keeps just enough of the Redis data model (strings, hashes, lists, sets,
//! sorted sets, expiry, SCAN, pub/sub) to exercise the client end to end.
//! `EVAL` echoes `KEYS` followed by `ARGV` as one array, and fails when the
//! script contains `error(`. `DEBUG SLEEP secs` stalls the connection.
//! Tests can also make `DEL` fail after a number of calls, or stop the server
//! from answering at all.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use nskv_client::{Manager, Options};

pub struct FakeServer {
    addr: String,
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    password: Option<String>,
    accepted: AtomicUsize,
    next_conn: AtomicUsize,
    silent: AtomicBool,
}

#[derive(Default)]
struct State {
    dbs: HashMap<i64, Db>,
    log: Vec<Vec<String>>,
    subscribers: Vec<Subscriber>,
    // DEL calls left before every further DEL fails.
    del_budget: Option<usize>,
}

#[derive(Default)]
struct Db {
    entries: HashMap<Vec<u8>, Entry>,
    next_seq: u64,
}

struct Entry {
    data: Data,
    expires: Option<Instant>,
    seq: u64,
}

enum Data {
    Str(Vec<u8>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    List(VecDeque<Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    ZSet(Vec<(f64, Vec<u8>)>),
}

struct Subscriber {
    conn: usize,
    channels: HashSet<Vec<u8>>,
    patterns: HashSet<Vec<u8>>,
    out: Arc<Mutex<TcpStream>>,
}

struct Session {
    id: usize,
    authed: bool,
    db: i64,
    out: Arc<Mutex<TcpStream>>,
}

enum Reply {
    Simple(&'static str),
    Error(String),
    Int(i64),
    Bulk(Vec<u8>),
    Nil,
    Array(Vec<Reply>),
}

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const NOT_INTEGER: &str = "ERR value is not an integer or out of range";
const SYNTAX: &str = "ERR syntax error";

impl FakeServer {
    pub fn start() -> Self {
        Self::spawn(None)
    }

    pub fn with_password(password: &str) -> Self {
        Self::spawn(Some(password.to_string()))
    }

    fn spawn(password: Option<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            password,
            accepted: AtomicUsize::new(0),
            next_conn: AtomicUsize::new(1),
            silent: AtomicBool::new(false),
        });

        let accept_shared = shared.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accept_shared.accepted.fetch_add(1, Ordering::SeqCst);
                let shared = accept_shared.clone();
                thread::spawn(move || serve(shared, stream));
            }
        });

        FakeServer { addr, shared }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Options pointing at this server with short socket timeouts.
    pub fn options(&self) -> Options {
        Options::new()
            .with_address(self.addr.clone())
            .with_connect_timeout(Duration::from_secs(2))
            .with_read_timeout(Duration::from_secs(2))
            .with_write_timeout(Duration::from_secs(2))
    }

    pub fn manager(&self, prefix: &str) -> Manager {
        Manager::new(self.options().with_prefix(prefix)).expect("manager")
    }

    /// Number of TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Live (unexpired) key names of a database, sorted.
    pub fn keys(&self, db: i64) -> Vec<String> {
        let mut state = self.shared.state.lock().unwrap();
        let now = Instant::now();
        let Some(db) = state.dbs.get_mut(&db) else {
            return Vec::new();
        };
        db.entries.retain(|_, entry| entry.expires.map_or(true, |at| at > now));
        let mut keys: Vec<String> = db
            .entries
            .keys()
            .map(|key| String::from_utf8_lossy(key).into_owned())
            .collect();
        keys.sort();
        keys
    }

    /// Every command received, with arguments, in arrival order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.shared.state.lock().unwrap().log.clone()
    }

    /// Received commands with the given name, without handshake traffic.
    pub fn commands_named(&self, name: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|cmd| cmd[0].eq_ignore_ascii_case(name))
            .collect()
    }

    /// Lets `calls` more `DEL` commands through, then answers every `DEL`
    /// with an error.
    pub fn fail_del_after(&self, calls: usize) {
        self.shared.state.lock().unwrap().del_budget = Some(calls);
    }

    /// Keeps accepting and reading commands but never replies again, like a
    /// half-open peer.
    pub fn go_silent(&self) {
        self.shared.silent.store(true, Ordering::SeqCst);
    }

    /// Inserts a raw string key, bypassing any namespace.
    pub fn insert(&self, db: i64, key: &str, value: &str) {
        let mut state = self.shared.state.lock().unwrap();
        let db = state.dbs.entry(db).or_default();
        db.put(key.as_bytes().to_vec(), Data::Str(value.as_bytes().to_vec()));
    }
}

fn serve(shared: Arc<Shared>, stream: TcpStream) {
    let out = Arc::new(Mutex::new(stream.try_clone().expect("clone")));
    let mut reader = BufReader::new(stream);
    let mut session = Session {
        id: shared.next_conn.fetch_add(1, Ordering::SeqCst),
        authed: shared.password.is_none(),
        db: 0,
        out: out.clone(),
    };

    while let Ok(args) = read_command(&mut reader) {
        if args.is_empty() {
            continue;
        }
        let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
        {
            let mut state = shared.state.lock().unwrap();
            state
                .log
                .push(args.iter().map(|a| String::from_utf8_lossy(a).into_owned()).collect());
        }
        if shared.silent.load(Ordering::SeqCst) {
            continue;
        }

        if name == "DEBUG" && args.len() == 3 && args[1].eq_ignore_ascii_case(b"SLEEP") {
            let secs: f64 = text(&args[2]).parse().unwrap_or(0.0);
            thread::sleep(Duration::from_secs_f64(secs));
            send(&out, &[Reply::Simple("OK")]);
            continue;
        }

        let replies = handle(&shared, &mut session, &name, &args[1..]);
        send(&out, &replies);
    }

    let mut state = shared.state.lock().unwrap();
    state.subscribers.retain(|sub| sub.conn != session.id);
}

fn send(out: &Arc<Mutex<TcpStream>>, replies: &[Reply]) {
    let mut buf = Vec::new();
    for reply in replies {
        encode(reply, &mut buf);
    }
    let mut stream = out.lock().unwrap();
    let _ = stream.write_all(&buf);
    let _ = stream.flush();
}

fn handle(shared: &Shared, session: &mut Session, name: &str, args: &[Vec<u8>]) -> Vec<Reply> {
    match name {
        "CLIENT" => return vec![Reply::Simple("OK")],
        "AUTH" => {
            let given = args.last().map(|p| text(p)).unwrap_or_default();
            return match &shared.password {
                Some(password) if *password == given => {
                    session.authed = true;
                    vec![Reply::Simple("OK")]
                }
                Some(_) => vec![err(
                    "WRONGPASS invalid username-password pair or user is disabled.",
                )],
                None => vec![err(
                    "ERR AUTH <password> called without any password configured for the default user.",
                )],
            };
        }
        _ => {}
    }
    if !session.authed {
        return vec![err("NOAUTH Authentication required.")];
    }

    let mut state = shared.state.lock().unwrap();
    match name {
        "SUBSCRIBE" | "PSUBSCRIBE" | "UNSUBSCRIBE" | "PUNSUBSCRIBE" => {
            return pubsub(&mut state, session, name, args);
        }
        "PUBLISH" => {
            if args.len() != 2 {
                return vec![arity(name)];
            }
            return vec![Reply::Int(publish(&mut state, &args[0], &args[1]))];
        }
        _ => {}
    }

    if state.subscribers.iter().any(|sub| sub.conn == session.id) && name != "PING" {
        return vec![err(&format!(
            "ERR Can't execute '{}': only (P|S)SUBSCRIBE / (P|S)UNSUBSCRIBE / PING / QUIT / RESET are allowed in this context",
            name.to_ascii_lowercase()
        ))];
    }

    if name == "SELECT" {
        return match args.first().and_then(|a| text(a).parse::<i64>().ok()) {
            Some(db) if (0..16).contains(&db) => {
                session.db = db;
                vec![Reply::Simple("OK")]
            }
            _ => vec![err("ERR DB index is out of range")],
        };
    }

    if name == "DEL" {
        match state.del_budget {
            Some(0) => return vec![err("ERR injected DEL failure")],
            Some(left) => state.del_budget = Some(left - 1),
            None => {}
        }
    }

    let db = state.dbs.entry(session.db).or_default();
    vec![db.execute(name, args)]
}

fn pubsub(state: &mut State, session: &Session, name: &str, args: &[Vec<u8>]) -> Vec<Reply> {
    if !state.subscribers.iter().any(|sub| sub.conn == session.id) {
        state.subscribers.push(Subscriber {
            conn: session.id,
            channels: HashSet::new(),
            patterns: HashSet::new(),
            out: session.out.clone(),
        });
    }
    let idx = state
        .subscribers
        .iter()
        .position(|sub| sub.conn == session.id)
        .expect("subscriber");
    let sub = &mut state.subscribers[idx];
    let mut replies = Vec::new();
    let tag = name.to_ascii_lowercase();

    match name {
        "SUBSCRIBE" | "PSUBSCRIBE" => {
            if args.is_empty() {
                return vec![arity(name)];
            }
            for target in args {
                if name == "SUBSCRIBE" {
                    sub.channels.insert(target.clone());
                } else {
                    sub.patterns.insert(target.clone());
                }
                let count = (sub.channels.len() + sub.patterns.len()) as i64;
                replies.push(confirmation(&tag, Some(target.clone()), count));
            }
        }
        _ => {
            let set = if name == "UNSUBSCRIBE" {
                &mut sub.channels
            } else {
                &mut sub.patterns
            };
            let targets: Vec<Vec<u8>> = if args.is_empty() {
                set.iter().cloned().collect()
            } else {
                args.to_vec()
            };
            for target in &targets {
                set.remove(target);
            }
            let remaining = sub.channels.len() + sub.patterns.len();
            if targets.is_empty() {
                replies.push(confirmation(&tag, None, remaining as i64));
            }
            for target in targets {
                replies.push(confirmation(&tag, Some(target), remaining as i64));
            }
        }
    }

    if sub.channels.is_empty() && sub.patterns.is_empty() {
        state.subscribers.remove(idx);
    }
    replies
}

fn confirmation(tag: &str, target: Option<Vec<u8>>, count: i64) -> Reply {
    Reply::Array(vec![
        Reply::Bulk(tag.as_bytes().to_vec()),
        target.map_or(Reply::Nil, Reply::Bulk),
        Reply::Int(count),
    ])
}

fn publish(state: &mut State, channel: &[u8], payload: &[u8]) -> i64 {
    let mut delivered = 0;
    for sub in &state.subscribers {
        if sub.channels.contains(channel) {
            let message = Reply::Array(vec![
                Reply::Bulk(b"message".to_vec()),
                Reply::Bulk(channel.to_vec()),
                Reply::Bulk(payload.to_vec()),
            ]);
            send(&sub.out, &[message]);
            delivered += 1;
        }
        for pattern in &sub.patterns {
            if glob_match(pattern, channel) {
                let message = Reply::Array(vec![
                    Reply::Bulk(b"pmessage".to_vec()),
                    Reply::Bulk(pattern.clone()),
                    Reply::Bulk(channel.to_vec()),
                    Reply::Bulk(payload.to_vec()),
                ]);
                send(&sub.out, &[message]);
                delivered += 1;
            }
        }
    }
    delivered
}

impl Db {
    fn put(&mut self, key: Vec<u8>, data: Data) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.entries.insert(
            key,
            Entry {
                data,
                expires: None,
                seq,
            },
        );
    }

    fn live(&mut self, key: &[u8]) -> Option<&mut Entry> {
        let expired = self
            .entries
            .get(key)
            .and_then(|entry| entry.expires)
            .map_or(false, |at| at <= Instant::now());
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn remove_if_empty(&mut self, key: &[u8]) {
        let empty = match self.entries.get(key).map(|entry| &entry.data) {
            Some(Data::Hash(map)) => map.is_empty(),
            Some(Data::List(list)) => list.is_empty(),
            Some(Data::Set(set)) => set.is_empty(),
            Some(Data::ZSet(zset)) => zset.is_empty(),
            _ => false,
        };
        if empty {
            self.entries.remove(key);
        }
    }

    fn execute(&mut self, name: &str, args: &[Vec<u8>]) -> Reply {
        match name {
            "PING" => match args.first() {
                Some(msg) => Reply::Bulk(msg.clone()),
                None => Reply::Simple("PONG"),
            },
            "GET" => self.get(args),
            "SET" => self.set(args),
            "EXISTS" => {
                let count = args.iter().filter(|key| self.live(key).is_some()).count();
                Reply::Int(count as i64)
            }
            "DEL" => {
                let mut removed = 0;
                for key in args {
                    if self.live(key).is_some() {
                        self.entries.remove(key);
                        removed += 1;
                    }
                }
                Reply::Int(removed)
            }
            "TTL" | "PTTL" => match args.first().and_then(|key| self.live(key)) {
                None => Reply::Int(-2),
                Some(Entry { expires: None, .. }) => Reply::Int(-1),
                Some(Entry {
                    expires: Some(at), ..
                }) => {
                    let left = at.saturating_duration_since(Instant::now()).as_millis() as i64;
                    if name == "TTL" {
                        Reply::Int((left + 500) / 1000)
                    } else {
                        Reply::Int(left)
                    }
                }
            },
            "EXPIRE" | "PEXPIRE" => {
                let (Some(key), Some(amount)) = (args.first(), args.get(1).and_then(int)) else {
                    return err(NOT_INTEGER);
                };
                let ttl = if name == "EXPIRE" {
                    Duration::from_secs(amount.max(0) as u64)
                } else {
                    Duration::from_millis(amount.max(0) as u64)
                };
                match self.live(key) {
                    Some(entry) => {
                        entry.expires = Some(Instant::now() + ttl);
                        Reply::Int(1)
                    }
                    None => Reply::Int(0),
                }
            }
            "INCR" | "DECR" | "INCRBY" | "DECRBY" => self.incr(name, args),
            "SCAN" => self.scan(args),
            "FLUSHDB" => {
                self.entries.clear();
                Reply::Simple("OK")
            }
            "HSET" | "HGET" | "HGETALL" | "HDEL" => self.hash(name, args),
            "LPUSH" | "RPUSH" | "LPOP" | "RPOP" | "LLEN" => self.list(name, args),
            "SADD" | "SREM" | "SMEMBERS" | "SCARD" | "SISMEMBER" | "SPOP" | "SRANDMEMBER" => {
                self.set_cmd(name, args)
            }
            "ZADD" | "ZREM" | "ZRANGE" | "ZREVRANGE" | "ZCARD" | "ZSCORE" | "ZRANK"
            | "ZREVRANK" => self.zset(name, args),
            "EVAL" => eval(args),
            _ => err(&format!("ERR unknown command '{}'", name.to_ascii_lowercase())),
        }
    }

    fn get(&mut self, args: &[Vec<u8>]) -> Reply {
        let Some(key) = args.first() else {
            return arity("GET");
        };
        match self.live(key).map(|entry| &entry.data) {
            None => Reply::Nil,
            Some(Data::Str(value)) => Reply::Bulk(value.clone()),
            Some(_) => err(WRONGTYPE),
        }
    }

    fn set(&mut self, args: &[Vec<u8>]) -> Reply {
        if args.len() < 2 {
            return arity("SET");
        }
        let (key, value) = (&args[0], &args[1]);
        let mut nx = false;
        let mut ttl = None;
        let mut idx = 2;
        while idx < args.len() {
            match text(&args[idx]).to_ascii_uppercase().as_str() {
                "NX" => nx = true,
                "EX" | "PX" => {
                    let unit = text(&args[idx]).to_ascii_uppercase();
                    let Some(amount) = args.get(idx + 1).and_then(int).filter(|n| *n > 0) else {
                        return err("ERR invalid expire time in 'set' command");
                    };
                    ttl = Some(if unit == "EX" {
                        Duration::from_secs(amount as u64)
                    } else {
                        Duration::from_millis(amount as u64)
                    });
                    idx += 1;
                }
                _ => return err(SYNTAX),
            }
            idx += 1;
        }
        if nx && self.live(key).is_some() {
            return Reply::Nil;
        }
        self.put(key.clone(), Data::Str(value.clone()));
        if let Some(ttl) = ttl {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.expires = Some(Instant::now() + ttl);
            }
        }
        Reply::Simple("OK")
    }

    fn incr(&mut self, name: &str, args: &[Vec<u8>]) -> Reply {
        let Some(key) = args.first() else {
            return arity(name);
        };
        let delta = match name {
            "INCR" => 1,
            "DECR" => -1,
            _ => match args.get(1).and_then(int) {
                Some(n) if name == "INCRBY" => n,
                Some(n) => -n,
                None => return err(NOT_INTEGER),
            },
        };
        let current = match self.live(key).map(|entry| &entry.data) {
            None => 0,
            Some(Data::Str(value)) => match int(value) {
                Some(n) => n,
                None => return err(NOT_INTEGER),
            },
            Some(_) => return err(WRONGTYPE),
        };
        let next = current + delta;
        match self.live(key) {
            Some(entry) => entry.data = Data::Str(next.to_string().into_bytes()),
            None => self.put(key.clone(), Data::Str(next.to_string().into_bytes())),
        }
        Reply::Int(next)
    }

    fn scan(&mut self, args: &[Vec<u8>]) -> Reply {
        let Some(cursor) = args.first().and_then(int) else {
            return err("ERR invalid cursor");
        };
        let mut pattern: Option<Vec<u8>> = None;
        let mut count = 10usize;
        let mut idx = 1;
        while idx + 1 < args.len() {
            match text(&args[idx]).to_ascii_uppercase().as_str() {
                "MATCH" => pattern = Some(args[idx + 1].clone()),
                "COUNT" => count = int(&args[idx + 1]).unwrap_or(10).max(1) as usize,
                _ => return err(SYNTAX),
            }
            idx += 2;
        }

        let now = Instant::now();
        let mut page: Vec<(u64, &Vec<u8>, bool)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.seq > cursor as u64)
            .map(|(key, entry)| (entry.seq, key, entry.expires.map_or(true, |at| at > now)))
            .collect();
        page.sort_by_key(|(seq, _, _)| *seq);
        let more = page.len() > count;
        page.truncate(count);

        let next = if more {
            page.last().map_or(0, |(seq, _, _)| *seq)
        } else {
            0
        };
        let keys = page
            .into_iter()
            .filter(|(_, key, live)| {
                *live && pattern.as_ref().map_or(true, |p| glob_match(p, key))
            })
            .map(|(_, key, _)| Reply::Bulk(key.clone()))
            .collect();
        Reply::Array(vec![
            Reply::Bulk(next.to_string().into_bytes()),
            Reply::Array(keys),
        ])
    }

    fn hash(&mut self, name: &str, args: &[Vec<u8>]) -> Reply {
        let Some(key) = args.first() else {
            return arity(name);
        };
        if name == "HSET" {
            if args.len() < 3 || args.len() % 2 == 0 {
                return arity(name);
            }
            if self.live(key).is_none() {
                self.put(key.clone(), Data::Hash(HashMap::new()));
            }
        }
        let Some(entry) = self.live(key) else {
            return match name {
                "HGET" => Reply::Nil,
                "HGETALL" => Reply::Array(Vec::new()),
                _ => Reply::Int(0),
            };
        };
        let Data::Hash(map) = &mut entry.data else {
            return err(WRONGTYPE);
        };
        let reply = match name {
            "HSET" => {
                let mut added = 0;
                for pair in args[1..].chunks(2) {
                    if map.insert(pair[0].clone(), pair[1].clone()).is_none() {
                        added += 1;
                    }
                }
                Reply::Int(added)
            }
            "HGET" => match args.get(1).and_then(|field| map.get(field)) {
                Some(value) => Reply::Bulk(value.clone()),
                None => Reply::Nil,
            },
            "HGETALL" => Reply::Array(
                map.iter()
                    .flat_map(|(f, v)| [Reply::Bulk(f.clone()), Reply::Bulk(v.clone())])
                    .collect(),
            ),
            _ => Reply::Int(
                args[1..]
                    .iter()
                    .filter(|field| map.remove(*field).is_some())
                    .count() as i64,
            ),
        };
        self.remove_if_empty(key);
        reply
    }

    fn list(&mut self, name: &str, args: &[Vec<u8>]) -> Reply {
        let Some(key) = args.first() else {
            return arity(name);
        };
        if matches!(name, "LPUSH" | "RPUSH") {
            if args.len() < 2 {
                return arity(name);
            }
            if self.live(key).is_none() {
                self.put(key.clone(), Data::List(VecDeque::new()));
            }
        }
        let Some(entry) = self.live(key) else {
            return match name {
                "LLEN" => Reply::Int(0),
                _ => Reply::Nil,
            };
        };
        let Data::List(list) = &mut entry.data else {
            return err(WRONGTYPE);
        };
        let reply = match name {
            "LPUSH" => {
                for value in &args[1..] {
                    list.push_front(value.clone());
                }
                Reply::Int(list.len() as i64)
            }
            "RPUSH" => {
                list.extend(args[1..].iter().cloned());
                Reply::Int(list.len() as i64)
            }
            "LPOP" => list.pop_front().map_or(Reply::Nil, Reply::Bulk),
            "RPOP" => list.pop_back().map_or(Reply::Nil, Reply::Bulk),
            _ => Reply::Int(list.len() as i64),
        };
        self.remove_if_empty(key);
        reply
    }

    fn set_cmd(&mut self, name: &str, args: &[Vec<u8>]) -> Reply {
        let Some(key) = args.first() else {
            return arity(name);
        };
        if name == "SADD" && self.live(key).is_none() {
            self.put(key.clone(), Data::Set(BTreeSet::new()));
        }
        let Some(entry) = self.live(key) else {
            return match name {
                "SMEMBERS" => Reply::Array(Vec::new()),
                "SPOP" | "SRANDMEMBER" => Reply::Nil,
                _ => Reply::Int(0),
            };
        };
        let Data::Set(set) = &mut entry.data else {
            return err(WRONGTYPE);
        };
        let reply = match name {
            "SADD" => Reply::Int(args[1..].iter().filter(|m| set.insert((*m).clone())).count() as i64),
            "SREM" => Reply::Int(args[1..].iter().filter(|m| set.remove(*m)).count() as i64),
            "SMEMBERS" => Reply::Array(set.iter().cloned().map(Reply::Bulk).collect()),
            "SCARD" => Reply::Int(set.len() as i64),
            "SISMEMBER" => Reply::Int(args.get(1).map_or(false, |m| set.contains(m)) as i64),
            "SPOP" => set.pop_first().map_or(Reply::Nil, Reply::Bulk),
            _ => set.first().cloned().map_or(Reply::Nil, Reply::Bulk),
        };
        self.remove_if_empty(key);
        reply
    }

    fn zset(&mut self, name: &str, args: &[Vec<u8>]) -> Reply {
        let Some(key) = args.first() else {
            return arity(name);
        };
        if name == "ZADD" {
            if args.len() < 3 || args.len() % 2 == 0 {
                return arity(name);
            }
            if self.live(key).is_none() {
                self.put(key.clone(), Data::ZSet(Vec::new()));
            }
        }
        let Some(entry) = self.live(key) else {
            return match name {
                "ZRANGE" | "ZREVRANGE" => Reply::Array(Vec::new()),
                "ZSCORE" | "ZRANK" | "ZREVRANK" => Reply::Nil,
                _ => Reply::Int(0),
            };
        };
        let Data::ZSet(zset) = &mut entry.data else {
            return err(WRONGTYPE);
        };
        let reply = match name {
            "ZADD" => {
                let mut added = 0;
                for pair in args[1..].chunks(2) {
                    let Some(score) = float(&pair[0]) else {
                        return err("ERR value is not a valid float");
                    };
                    match zset.iter_mut().find(|(_, member)| *member == pair[1]) {
                        Some(existing) => existing.0 = score,
                        None => {
                            zset.push((score, pair[1].clone()));
                            added += 1;
                        }
                    }
                }
                zset.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
                Reply::Int(added)
            }
            "ZREM" => {
                let before = zset.len();
                zset.retain(|(_, member)| !args[1..].contains(member));
                Reply::Int((before - zset.len()) as i64)
            }
            "ZRANGE" | "ZREVRANGE" => {
                let (Some(start), Some(stop)) = (args.get(1).and_then(int), args.get(2).and_then(int))
                else {
                    return err(NOT_INTEGER);
                };
                let with_scores = args
                    .get(3)
                    .map_or(false, |flag| flag.eq_ignore_ascii_case(b"WITHSCORES"));
                let mut ordered: Vec<&(f64, Vec<u8>)> = zset.iter().collect();
                if name == "ZREVRANGE" {
                    ordered.reverse();
                }
                let len = ordered.len() as i64;
                let start = if start < 0 { (len + start).max(0) } else { start };
                let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
                let mut items = Vec::new();
                if start <= stop {
                    for (score, member) in &ordered[start as usize..=stop as usize] {
                        items.push(Reply::Bulk(member.clone()));
                        if with_scores {
                            items.push(Reply::Bulk(score.to_string().into_bytes()));
                        }
                    }
                }
                Reply::Array(items)
            }
            "ZCARD" => Reply::Int(zset.len() as i64),
            "ZSCORE" => match args.get(1).and_then(|m| zset.iter().find(|(_, member)| member == m)) {
                Some((score, _)) => Reply::Bulk(score.to_string().into_bytes()),
                None => Reply::Nil,
            },
            _ => {
                let position = args
                    .get(1)
                    .and_then(|m| zset.iter().position(|(_, member)| member == m));
                match position {
                    Some(rank) if name == "ZRANK" => Reply::Int(rank as i64),
                    Some(rank) => Reply::Int((zset.len() - 1 - rank) as i64),
                    None => Reply::Nil,
                }
            }
        };
        self.remove_if_empty(key);
        reply
    }
}

fn eval(args: &[Vec<u8>]) -> Reply {
    let (Some(script), Some(numkeys)) = (args.first(), args.get(1).and_then(int)) else {
        return arity("EVAL");
    };
    if text(script).contains("error(") {
        return err("ERR user_script:1: Script attempted to raise an error");
    }
    if numkeys < 0 || numkeys as usize > args.len() - 2 {
        return err("ERR Number of keys can't be greater than number of args");
    }
    Reply::Array(args[2..].iter().cloned().map(Reply::Bulk).collect())
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<Vec<u8>>> {
    let mut line = Vec::new();
    read_line(reader, &mut line)?;
    if line.first() != Some(&b'*') {
        return Err(invalid("expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line)?;
        if line.first() != Some(&b'$') {
            return Err(invalid("expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data)?;
        if !data.ends_with(b"\r\n") {
            return Err(invalid("missing crlf"));
        }
        data.truncate(len);
        args.push(data);
    }
    Ok(args)
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
    }
    if !buf.ends_with(b"\r\n") {
        return Err(invalid("invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| invalid("length"))
}

fn invalid(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}

fn encode(reply: &Reply, buf: &mut Vec<u8>) {
    match reply {
        Reply::Simple(text) => buf.extend_from_slice(format!("+{text}\r\n").as_bytes()),
        Reply::Error(text) => buf.extend_from_slice(format!("-{text}\r\n").as_bytes()),
        Reply::Int(value) => buf.extend_from_slice(format!(":{value}\r\n").as_bytes()),
        Reply::Bulk(data) => {
            buf.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
            buf.extend_from_slice(data);
            buf.extend_from_slice(b"\r\n");
        }
        Reply::Nil => buf.extend_from_slice(b"$-1\r\n"),
        Reply::Array(items) => {
            buf.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                encode(item, buf);
            }
        }
    }
}

fn err(message: &str) -> Reply {
    Reply::Error(message.to_string())
}

fn arity(name: &str) -> Reply {
    err(&format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_ascii_lowercase()
    ))
}

fn text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

fn int(data: &Vec<u8>) -> Option<i64> {
    std::str::from_utf8(data).ok()?.parse().ok()
}

fn float(data: &[u8]) -> Option<f64> {
    match std::str::from_utf8(data).ok()? {
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

/// Redis-style glob: `*`, `?` and literal bytes.
pub fn glob_match(pattern: &[u8], name: &[u8]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((b'*', rest)) => (0..=name.len()).any(|skip| glob_match(rest, &name[skip..])),
        Some((b'?', rest)) => !name.is_empty() && glob_match(rest, &name[1..]),
        Some((byte, rest)) => name.first() == Some(byte) && glob_match(rest, &name[1..]),
    }
}
