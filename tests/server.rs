use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;

use qb_compare::passers_by_year::PassersByYear;
use qb_compare::play_store::{self, Play};
use qb_compare::web::{self, AppContext};

fn seeded_db_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("qb_compare_server_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let path = dir.join(format!("{name}.sqlite"));
    let _ = std::fs::remove_file(&path);
    let conn = play_store::open_db(&path).expect("db should open");
    play_store::insert_plays(
        &conn,
        &[Play {
            season: 2009,
            passer: Some("Brady".to_string()),
            epa: Some(0.4),
            air_yards: Some(15.0),
            ..Play::default()
        }],
    )
    .expect("plays should insert");
    path
}

fn spawn_server(name: &str) -> SocketAddr {
    let passers =
        PassersByYear::from_seasons(BTreeMap::from([(2009, vec!["Brady".to_string()])]));
    let ctx = AppContext::new(seeded_db_path(name), passers).expect("context should build");

    let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral port should bind");
    let addr = listener.local_addr().expect("listener has an address");
    std::thread::spawn(move || {
        let _ = web::serve(listener, &ctx);
    });
    addr
}

#[test]
fn serves_comparison_page_over_http() {
    let addr = spawn_server("page");

    let client = reqwest::blocking::Client::new();
    let base = format!("http://{addr}/");

    let resp = client
        .get(&base)
        .query(&[("qb1", "Brady"), ("year1", "2009"), ("qb2", "Average"), ("year2", "2009")])
        .send()
        .expect("request should succeed");
    assert_eq!(resp.status().as_u16(), 200);
    let body = resp.text().expect("body should be text");
    assert!(body.contains("data:image/svg+xml;base64,"));
    assert!(body.contains("&#39;09 Brady vs &#39;09 Average"));

    let resp = client
        .get(&base)
        .query(&[("qb1", "Brady"), ("year1", "2009")])
        .send()
        .expect("request should succeed");
    assert_eq!(resp.status().as_u16(), 200);
    let body = resp.text().expect("body should be text");
    assert!(!body.contains("data:image/svg+xml"));
    assert!(body.contains(r#"{"2009":["Average","Brady"]}"#));
}

#[test]
fn idle_connection_does_not_block_later_requests() {
    let addr = spawn_server("idle");
    let _idle = TcpStream::connect(addr).expect("idle client should connect");

    let client = reqwest::blocking::Client::builder()
        .timeout(web::READ_TIMEOUT * 4)
        .build()
        .expect("client should build");
    let resp = client
        .get(format!("http://{addr}/"))
        .send()
        .expect("request after an idle client should be served");
    assert_eq!(resp.status().as_u16(), 200);
}
