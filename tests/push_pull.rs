use magicrepos::Error;
use magicrepos::oracles::OwnerWritesAccess;
use magicrepos::transport::{self, Message, RemoteTarget};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

mod common;

/// Spawn a single-session server and hand back the address to dial
fn single_session_server(
    root: PathBuf,
    username: &str,
) -> anyhow::Result<(std::net::SocketAddr, JoinHandle<magicrepos::Result<()>>)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let username = username.to_string();

    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept()?;
        let mut reader = stream.try_clone()?;
        let mut writer = stream;
        transport::serve(&root, &OwnerWritesAccess, &username, &mut reader, &mut writer)
    });

    Ok((addr, handle))
}

fn connect(addr: std::net::SocketAddr) -> anyhow::Result<(TcpStream, TcpStream)> {
    let stream = TcpStream::connect(addr)?;
    Ok((stream.try_clone()?, stream))
}

fn stored_ids(control: &Path) -> anyhow::Result<BTreeSet<String>> {
    let mut ids = BTreeSet::new();
    let objects = control.join("objects");
    if !objects.exists() {
        return Ok(ids);
    }

    for entry in walkdir::WalkDir::new(&objects) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let suffix = entry.file_name().to_string_lossy().to_string();
            let prefix = entry
                .path()
                .parent()
                .and_then(|parent| parent.file_name())
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            ids.insert(format!("{prefix}{suffix}"));
        }
    }

    Ok(ids)
}

#[test]
fn push_then_pull_round_trips_a_commit() -> anyhow::Result<()> {
    let client_dir = assert_fs::TempDir::new()?;
    let server_dir = assert_fs::TempDir::new()?;

    // one commit on main: exactly one blob, one tree, one commit
    let repo = common::init_repo(client_dir.path());
    common::write_file(client_dir.path(), "hello.txt", "Hello, World!");
    repo.stage_all()?;
    let commit_id = repo.commit("c1", None)?;

    let mut closure = BTreeSet::new();
    transport::walker::collect(repo.database(), commit_id, &mut closure)?;
    assert_eq!(closure.len(), 3);

    // push A -> B
    let target = RemoteTarget::parse("alice@localhost:alice/project")?;
    let (addr, server) = single_session_server(server_dir.path().to_path_buf(), "alice")?;
    let (mut reader, mut writer) = connect(addr)?;
    let detail = transport::push(repo.database(), repo.refs(), &target, &mut reader, &mut writer)?;
    drop(writer);
    server.join().expect("server thread")?;
    assert!(detail.contains("1 refs"));

    // the receiver holds exactly the closure of the pushed tip
    let bare_control = server_dir.path().join("alice").join("project.mr");
    let expected: BTreeSet<String> = closure.iter().map(|id| id.to_hex()).collect();
    assert_eq!(stored_ids(&bare_control)?, expected);

    let bare = transport::BareRepository::open(server_dir.path(), "alice", "project")?;
    assert_eq!(bare.refs().resolve_branch("main")?, Some(commit_id));
    assert_eq!(bare.refs().resolve_head()?, Some(commit_id));

    // pulling B -> A again is a no-op for the object store
    let before = stored_ids(&client_dir.path().join(".magicrepos"))?;
    let (addr, server) = single_session_server(server_dir.path().to_path_buf(), "alice")?;
    let (mut reader, mut writer) = connect(addr)?;
    let advertised = transport::pull(
        repo.database(),
        repo.refs(),
        &target,
        "origin",
        &mut reader,
        &mut writer,
    )?;
    drop(writer);
    server.join().expect("server thread")?;

    assert_eq!(advertised.get("refs/heads/main"), Some(&commit_id));
    assert_eq!(advertised.get("HEAD"), Some(&commit_id));
    assert_eq!(stored_ids(&client_dir.path().join(".magicrepos"))?, before);
    assert_eq!(
        repo.resolve("refs/remotes/origin/main")?,
        Some(commit_id)
    );

    Ok(())
}

#[test]
fn pull_into_a_fresh_repository_brings_the_closure() -> anyhow::Result<()> {
    let source_dir = assert_fs::TempDir::new()?;
    let server_dir = assert_fs::TempDir::new()?;
    let sink_dir = assert_fs::TempDir::new()?;

    let source = common::init_repo(source_dir.path());
    common::write_file(source_dir.path(), "a.txt", "alpha");
    common::write_file(source_dir.path(), "dir/b.txt", "beta");
    source.stage_all()?;
    let tip = source.commit("seed", None)?;

    let target = RemoteTarget::parse("alice@localhost:alice/shared")?;

    let (addr, server) = single_session_server(server_dir.path().to_path_buf(), "alice")?;
    let (mut reader, mut writer) = connect(addr)?;
    transport::push(source.database(), source.refs(), &target, &mut reader, &mut writer)?;
    drop(writer);
    server.join().expect("server thread")?;

    let sink = common::init_repo(sink_dir.path());
    let (addr, server) = single_session_server(server_dir.path().to_path_buf(), "bob")?;
    let (mut reader, mut writer) = connect(addr)?;
    let advertised = transport::pull(
        sink.database(),
        sink.refs(),
        &target,
        "origin",
        &mut reader,
        &mut writer,
    )?;
    drop(writer);
    server.join().expect("server thread")?;

    assert_eq!(advertised.get("refs/heads/main"), Some(&tip));
    assert_eq!(sink.resolve("refs/remotes/origin/main")?, Some(tip));

    // every object reachable from the tip made the trip
    let mut closure = BTreeSet::new();
    transport::walker::collect(sink.database(), tip, &mut closure)?;
    assert_eq!(closure.len(), 5); // two blobs, two trees, one commit

    Ok(())
}

#[test]
fn pull_from_an_empty_repository_yields_nothing() -> anyhow::Result<()> {
    let client_dir = assert_fs::TempDir::new()?;
    let server_dir = assert_fs::TempDir::new()?;

    transport::BareRepository::create(server_dir.path(), "alice", "empty")?;
    let repo = common::init_repo(client_dir.path());

    let target = RemoteTarget::parse("alice@localhost:alice/empty")?;
    let (addr, server) = single_session_server(server_dir.path().to_path_buf(), "alice")?;
    let (mut reader, mut writer) = connect(addr)?;
    let advertised = transport::pull(
        repo.database(),
        repo.refs(),
        &target,
        "origin",
        &mut reader,
        &mut writer,
    )?;
    drop(writer);
    server.join().expect("server thread")?;

    assert!(advertised.is_empty());

    Ok(())
}

#[test]
fn unauthorized_push_is_refused() -> anyhow::Result<()> {
    let client_dir = assert_fs::TempDir::new()?;
    let server_dir = assert_fs::TempDir::new()?;

    let repo = common::init_repo(client_dir.path());
    common::write_file(client_dir.path(), "a.txt", "x");
    repo.stage_all()?;
    repo.commit("c1", None)?;

    let target = RemoteTarget::parse("mallory@localhost:alice/project")?;
    let (addr, server) = single_session_server(server_dir.path().to_path_buf(), "mallory")?;
    let (mut reader, mut writer) = connect(addr)?;

    let result = transport::push(repo.database(), repo.refs(), &target, &mut reader, &mut writer);
    assert!(matches!(result, Err(Error::PushFailed(_))));

    drop(writer);
    assert!(matches!(
        server.join().expect("server thread"),
        Err(Error::Unauthorized(_))
    ));

    Ok(())
}

#[test]
fn pull_of_a_missing_repository_is_refused() -> anyhow::Result<()> {
    let client_dir = assert_fs::TempDir::new()?;
    let server_dir = assert_fs::TempDir::new()?;

    let repo = common::init_repo(client_dir.path());
    let target = RemoteTarget::parse("bob@localhost:alice/ghost")?;
    let (addr, server) = single_session_server(server_dir.path().to_path_buf(), "bob")?;
    let (mut reader, mut writer) = connect(addr)?;

    let result = transport::pull(
        repo.database(),
        repo.refs(),
        &target,
        "origin",
        &mut reader,
        &mut writer,
    );
    assert!(matches!(result, Err(Error::PullFailed(_))));

    drop(writer);
    assert!(server.join().expect("server thread").is_err());

    Ok(())
}

#[test]
fn session_must_open_with_a_negotiate_request() -> anyhow::Result<()> {
    let server_dir = assert_fs::TempDir::new()?;
    let (addr, server) = single_session_server(server_dir.path().to_path_buf(), "alice")?;
    let (mut reader, mut writer) = connect(addr)?;

    Message::PackComplete.write_to(&mut writer)?;

    match Message::read_from(&mut reader)? {
        Message::Error { detail } => assert!(detail.contains("NegotiateRequest")),
        other => panic!("expected an error reply, got {}", other.name()),
    }

    drop(writer);
    assert!(matches!(
        server.join().expect("server thread"),
        Err(Error::ProtocolViolation(_))
    ));

    Ok(())
}
