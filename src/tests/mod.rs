use std::time::Duration;

use httptest::matchers::*;
use httptest::responders;
use httptest::{Expectation, Server};

use crate::fuzzer::HideConfig;
use crate::runner::{Options, Runner, WordlistSource};

fn base(server: &Server) -> String {
    format!("http://{}", server.addr())
}

fn words(list: &[&str]) -> WordlistSource {
    WordlistSource::Inline(list.iter().map(|s| s.to_string()).collect())
}

fn options(url: String, wordlist: WordlistSource) -> Options {
    Options {
        url,
        wordlist,
        concurrency: 2,
        timeout_ms: 2_000,
        progress_interval_ms: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn appends_entries_and_hides_not_found() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/home.php"))
            .respond_with(responders::status_code(200).body("welcome home\n")),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/login.php"))
            .respond_with(responders::status_code(404)),
    );

    let runner = Runner::new(Options {
        extensions: vec![".php".to_string()],
        ..options(base(&server), words(&["home", "login"]))
    })
    .unwrap();
    let scan = runner.run().await.unwrap();

    assert_eq!(scan.results.len(), 1);
    assert_eq!(scan.results[0].label, "home");
    assert_eq!(scan.results[0].status, 200);
    assert_eq!(scan.summary.produced, 2);
    assert_eq!(scan.summary.completed, 2);
    assert_eq!(scan.summary.approx_total, 2);
    assert_eq!(scan.summary.emitted, 1);
}

#[tokio::test]
async fn show_404_keeps_not_found_results() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/missing"))
            .respond_with(responders::status_code(404)),
    );

    let runner = Runner::new(Options {
        hide: HideConfig {
            show_404: true,
            ..Default::default()
        },
        ..options(base(&server), words(&["missing"]))
    })
    .unwrap();
    let scan = runner.run().await.unwrap();
    assert_eq!(scan.results.len(), 1);
    assert_eq!(scan.results[0].status, 404);
}

#[tokio::test]
async fn keyword_in_path_is_substituted() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/admin/page"))
            .respond_with(responders::status_code(200)),
    );

    let runner = Runner::new(options(
        format!("{}/FUZZ/page", base(&server)),
        words(&["admin"]),
    ))
    .unwrap();
    assert!(runner.keyword_present());
    let scan = runner.run().await.unwrap();
    assert_eq!(scan.results.len(), 1);
    assert_eq!(scan.results[0].label, "admin");
}

#[tokio::test]
async fn keyword_in_body_and_header_is_substituted() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/login"),
            request::body("user=admin&pass=hunter2".to_string()),
            request::headers(contains(("x-attempt", "hunter2"))),
        ])
        .respond_with(responders::status_code(200)),
    );

    let runner = Runner::new(Options {
        method: "POST".to_string(),
        body: "user=admin&pass=FUZZ".to_string(),
        header: Some("X-Attempt: FUZZ".to_string()),
        ..options(format!("{}/login", base(&server)), words(&["hunter2"]))
    })
    .unwrap();
    let scan = runner.run().await.unwrap();
    assert_eq!(scan.results.len(), 1);
    assert_eq!(scan.results[0].status, 200);
}

#[tokio::test]
async fn response_metrics_are_measured() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/notes"))
            .respond_with(responders::status_code(200).body("hello world\nfoo bar\n")),
    );

    let runner = Runner::new(options(base(&server), words(&["notes"]))).unwrap();
    let scan = runner.run().await.unwrap();
    let r = &scan.results[0];
    assert_eq!(r.content_length, 20);
    assert_eq!(r.words, 4);
    assert_eq!(r.lines, 2);
    assert!(r.header_size > 0);
}

#[tokio::test]
async fn hide_sets_filter_results() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/a"))
            .respond_with(responders::status_code(200)),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/b"))
            .respond_with(responders::status_code(500)),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/c"))
            .respond_with(responders::status_code(200).body("four")),
    );

    let runner = Runner::new(Options {
        hide: HideConfig {
            status: "500".to_string(),
            size: "4".to_string(),
            ..Default::default()
        },
        ..options(base(&server), words(&["a", "b", "c"]))
    })
    .unwrap();
    let scan = runner.run().await.unwrap();
    assert_eq!(scan.results.len(), 1);
    assert_eq!(scan.results[0].label, "a");
    assert_eq!(scan.summary.completed, 3);
}

#[tokio::test]
async fn redirects_are_not_followed_by_default() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/old"))
            .respond_with(responders::status_code(301).insert_header("location", "/new")),
    );

    let runner = Runner::new(options(base(&server), words(&["old"]))).unwrap();
    let scan = runner.run().await.unwrap();
    assert_eq!(scan.results.len(), 1);
    assert_eq!(scan.results[0].status, 301);
}

#[tokio::test]
async fn redirects_are_followed_when_enabled() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/old"))
            .respond_with(responders::status_code(301).insert_header("location", "/new")),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/new"))
            .respond_with(responders::status_code(200)),
    );

    let runner = Runner::new(Options {
        follow_redirects: true,
        ..options(base(&server), words(&["old"]))
    })
    .unwrap();
    let scan = runner.run().await.unwrap();
    assert_eq!(scan.results.len(), 1);
    assert_eq!(scan.results[0].status, 200);
    assert_eq!(scan.results[0].label, "old");
}

#[tokio::test]
async fn zero_timeout_waits_for_slow_responses() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/slow")).respond_with(
            responders::delay_and_then(Duration::from_millis(150), responders::status_code(200)),
        ),
    );

    let runner = Runner::new(Options {
        timeout_ms: 0,
        max_retries: 0,
        ..options(base(&server), words(&["slow"]))
    })
    .unwrap();
    let scan = runner.run().await.unwrap();
    assert_eq!(scan.results.len(), 1);
    assert_eq!(scan.results[0].status, 200);
    assert_eq!(scan.summary.completed, 1);
}

#[tokio::test]
async fn unreachable_target_is_retried_then_abandoned() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let runner = Runner::new(Options {
        max_retries: 2,
        ..options(format!("http://127.0.0.1:{port}"), words(&["a", "b"]))
    })
    .unwrap();
    let scan = runner.run().await.unwrap();

    assert!(scan.results.is_empty());
    // two descriptors, three attempts each
    assert_eq!(scan.summary.completed, 6);
    assert_eq!(scan.summary.approx_total, 6);
    assert_eq!(scan.summary.emitted, 0);
}

#[tokio::test]
async fn progress_snapshots_are_monotonic() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method("GET"))
            .times(12)
            .respond_with(
                responders::delay_and_then(Duration::from_millis(5), responders::status_code(404)),
            ),
    );

    let runner = Runner::new(Options {
        extensions: vec![".php".to_string(), ".bak".to_string()],
        ..options(
            base(&server),
            words(&["one", "two", "three", "four", "five", "six"]),
        )
    })
    .unwrap();
    let scan = runner.run().await.unwrap();

    assert!(!scan.progress.is_empty());
    for pair in scan.progress.windows(2) {
        assert!(pair[0].done <= pair[1].done);
        assert!(pair[0].approx_total <= pair[1].approx_total);
    }
    let last = scan.progress.last().unwrap();
    assert_eq!(last.done, 12);
    assert_eq!(last.approx_total, 12);
    assert!(last.done <= last.approx_total);
}

#[tokio::test]
async fn disabled_progress_sends_no_snapshots() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/x"))
            .respond_with(responders::status_code(200)),
    );

    let runner = Runner::new(Options {
        progress: false,
        ..options(base(&server), words(&["x"]))
    })
    .unwrap();
    let scan = runner.run().await.unwrap();
    assert!(scan.progress.is_empty());
    assert_eq!(scan.summary.approx_total, 1);
}

#[tokio::test]
async fn wordlist_file_skips_blank_lines() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method("GET"))
            .times(2)
            .respond_with(responders::status_code(200)),
    );
    let path = std::env::temp_dir().join(format!("kurodo_e2e_words_{}.txt", std::process::id()));
    std::fs::write(&path, "home\n\n   \nlogin\n").unwrap();

    let runner = Runner::new(options(
        base(&server),
        WordlistSource::FilePath(path.to_string_lossy().to_string()),
    ))
    .unwrap();
    let scan = runner.run().await.unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(scan.results.len(), 2);
    assert_eq!(scan.summary.produced, 2);
    assert_eq!(scan.summary.approx_total, 2);
    let mut labels: Vec<_> = scan.results.iter().map(|r| r.label.clone()).collect();
    labels.sort();
    assert_eq!(labels, vec!["home".to_string(), "login".to_string()]);
}

#[tokio::test]
async fn non_utf8_wordlist_line_is_still_requested() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method("GET"))
            .times(4)
            .respond_with(responders::status_code(200)),
    );
    let path = std::env::temp_dir().join(format!("kurodo_e2e_latin1_{}.txt", std::process::id()));
    std::fs::write(&path, b"home\ncaf\xe9\nlogin\nadmin\n").unwrap();

    let runner = Runner::new(options(
        base(&server),
        WordlistSource::FilePath(path.to_string_lossy().to_string()),
    ))
    .unwrap();
    let scan = runner.run().await.unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(scan.summary.produced, 4);
    assert_eq!(scan.summary.completed, 4);
    assert_eq!(scan.summary.approx_total, 4);
    let last = scan.progress.last().unwrap();
    assert!(last.done <= last.approx_total);
    let mut labels: Vec<_> = scan.results.iter().map(|r| r.label.clone()).collect();
    labels.sort();
    assert_eq!(labels, vec!["admin", "caf\u{FFFD}", "home", "login"]);
}

#[tokio::test]
async fn title_case_keyword_in_path_is_substituted() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/admin/page"))
            .respond_with(responders::status_code(200)),
    );

    let runner = Runner::new(options(
        format!("{}/Fuzz/page", base(&server)),
        words(&["admin"]),
    ))
    .unwrap();
    assert!(runner.keyword_present());
    let scan = runner.run().await.unwrap();
    assert_eq!(scan.results.len(), 1);
    assert_eq!(scan.results[0].label, "admin");
}

#[tokio::test]
async fn dropping_the_result_stream_stops_the_scan() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method("GET"))
            .times(..)
            .respond_with(responders::status_code(200)),
    );

    let entries: Vec<String> = (0..200).map(|i| format!("p{i}")).collect();
    let runner = Runner::new(options(base(&server), WordlistSource::Inline(entries))).unwrap();
    let channels = runner.start().await.unwrap();
    drop(channels.results);
    drop(channels.progress);

    let summary = tokio::time::timeout(Duration::from_secs(10), channels.finished)
        .await
        .unwrap()
        .unwrap();
    assert!(summary.completed < 200);
    assert_eq!(summary.emitted, 0);
}
