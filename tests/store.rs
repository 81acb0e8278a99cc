use rusqlite::Connection;

use qb_compare::play_store::{
    self, AVERAGE, Play, count_season_plays, fetch_plays, insert_plays, passers_in_season,
};

fn passer_play(season: i32, passer: &str, epa: f64) -> Play {
    Play {
        season,
        passer: Some(passer.to_string()),
        epa: Some(epa),
        air_yards: Some(6.0),
        ..Play::default()
    }
}

fn rusher_play(season: i32, rusher: &str, epa: f64) -> Play {
    Play {
        season,
        rusher: Some(rusher.to_string()),
        epa: Some(epa),
        rush: true,
        ..Play::default()
    }
}

fn seeded_db() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory sqlite should open");
    play_store::init_schema(&conn).expect("schema should apply");
    insert_plays(
        &conn,
        &[
            passer_play(2021, "P.Mahomes", 0.5),
            passer_play(2021, "P.Mahomes", -0.2),
            rusher_play(2021, "P.Mahomes", 0.3),
            passer_play(2021, "J.Allen", 0.1),
            rusher_play(2021, "D.Henry", 0.0),
            passer_play(2020, "P.Mahomes", 0.7),
        ],
    )
    .expect("seed plays should insert");
    conn
}

#[test]
fn participant_matches_passer_or_rusher_in_season() {
    let conn = seeded_db();
    let plays = fetch_plays(&conn, "P.Mahomes", 2021).unwrap();
    assert_eq!(plays.len(), 3);
    assert!(plays.iter().all(|p| p.season == 2021));
    assert!(plays.iter().all(|p| {
        p.passer.as_deref() == Some("P.Mahomes") || p.rusher.as_deref() == Some("P.Mahomes")
    }));
}

#[test]
fn average_selects_the_whole_season() {
    let conn = seeded_db();
    let plays = fetch_plays(&conn, AVERAGE, 2021).unwrap();
    assert_eq!(plays.len(), count_season_plays(&conn, 2021).unwrap());
    assert_eq!(plays.len(), 5);
}

#[test]
fn unknown_selection_is_empty_not_an_error() {
    let conn = seeded_db();
    assert!(fetch_plays(&conn, "Nobody", 2021).unwrap().is_empty());
    assert!(fetch_plays(&conn, "P.Mahomes", 1999).unwrap().is_empty());
    assert!(fetch_plays(&conn, AVERAGE, 1999).unwrap().is_empty());
}

#[test]
fn stored_plays_round_trip_their_fields() {
    let conn = seeded_db();
    let plays = fetch_plays(&conn, "D.Henry", 2021).unwrap();
    assert_eq!(plays, vec![rusher_play(2021, "D.Henry", 0.0)]);
}

#[test]
fn passers_are_filtered_by_volume() {
    let conn = seeded_db();
    assert_eq!(
        passers_in_season(&conn, 2021, 1).unwrap(),
        vec!["J.Allen".to_string(), "P.Mahomes".to_string()]
    );
    assert_eq!(
        passers_in_season(&conn, 2021, 2).unwrap(),
        vec!["P.Mahomes".to_string()]
    );
}

#[test]
fn replacing_a_season_leaves_others_alone() {
    let mut conn = seeded_db();
    let n = play_store::replace_season(&mut conn, 2021, &[passer_play(2021, "T.Brady", 0.2)])
        .unwrap();
    assert_eq!(n, 1);
    assert_eq!(count_season_plays(&conn, 2021).unwrap(), 1);
    assert_eq!(count_season_plays(&conn, 2020).unwrap(), 1);
    assert_eq!(play_store::seasons(&conn).unwrap(), vec![2020, 2021]);
}
