//! Line-oriented test driver for the B+ tree: reads one command per line
//! from stdin, dispatches it against a single open tree, and prints results
//! until `quit` or end of input.

mod config;

use std::io::{self, BufRead, Write};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use btree::BTreeFile;
use common::api::RecordId;
use common::error::TreeError;

use config::{Args, Config};

fn main() -> anyhow::Result<()> {
    let config = Config::from_args(Args::parse())?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    println!("btree-cli: opening {:?} (pool size {})", config.db_path, config.pool_size);

    let pool = buffer_pool::open(&config.db_path, config.pool_size)?;

    let mut tree = match BTreeFile::open(&pool, &config.tree_name) {
        Ok(t) => t,
        Err(TreeError::Invariant(_)) => BTreeFile::create(&pool, &config.tree_name)?,
        Err(e) => return Err(e.into()),
    };

    println!("ready - tree {:?}, commands: insert/scan/delete/deletescan/print/stats/quit", config.tree_name);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = tokens.first() else { continue };

        match cmd {
            "quit" => break,
            "insert" => match parse_bounds(&tokens) {
                Some((lo, hi)) => insert_high_low(&mut tree, lo, hi),
                None => println!("FAIL: usage: insert <lo> <hi>"),
            },
            "scan" => match parse_optional_bounds(&tokens) {
                Some((lo, hi)) => scan_high_low(&tree, lo, hi),
                None => println!("FAIL: usage: scan <lo> <hi>"),
            },
            "delete" => match parse_optional_bounds(&tokens) {
                Some((lo, hi)) => delete_high_low(&mut tree, lo, hi),
                None => println!("FAIL: usage: delete <lo> <hi>"),
            },
            "deletescan" => match parse_optional_bounds(&tokens) {
                Some((lo, hi)) => delete_scan_high_low(&mut tree, lo, hi),
                None => println!("FAIL: usage: deletescan <lo> <hi>"),
            },
            "print" => match tree.print() {
                Ok(s) => print!("{s}"),
                Err(e) => {
                    tracing::error!(error = %e, "print failed");
                    println!("FAIL: {e}");
                }
            },
            "stats" => match tree.dump_statistics() {
                Ok(stats) => println!(
                    "height={} leaf_pages={} index_pages={} entries={}",
                    stats.height, stats.leaf_pages, stats.index_pages, stats.entries
                ),
                Err(e) => {
                    tracing::error!(error = %e, "stats failed");
                    println!("FAIL: {e}");
                }
            },
            other => println!("FAIL: unrecognized command {other:?}"),
        }
        io::stdout().flush().ok();
    }

    Ok(())
}

fn parse_bounds(tokens: &[&str]) -> Option<(i32, i32)> {
    let lo: i32 = tokens.get(1)?.parse().ok()?;
    let hi: i32 = tokens.get(2)?.parse().ok()?;
    Some((lo, hi))
}

/// Same shape as `parse_bounds`, but `-1` on either side means "unbounded".
fn parse_optional_bounds(tokens: &[&str]) -> Option<(Option<i32>, Option<i32>)> {
    let (lo, hi) = parse_bounds(tokens)?;
    Some((if lo == -1 { None } else { Some(lo) }, if hi == -1 { None } else { Some(hi) }))
}

fn insert_high_low(tree: &mut BTreeFile<'_>, lo: i32, hi: i32) {
    let span = tracing::info_span!("insert", lo, hi);
    let _enter = span.enter();
    for key in lo..=hi {
        let offset = key - lo;
        let rid = RecordId::new(offset, offset + 1);
        if let Err(e) = tree.insert(key, rid) {
            tracing::error!(key, error = %e, "insert failed");
            println!("FAIL: {e}");
            return;
        }
    }
    println!("OK");
}

fn scan_high_low(tree: &BTreeFile<'_>, lo: Option<i32>, hi: Option<i32>) {
    let span = tracing::info_span!("open_scan", ?lo, ?hi);
    let _enter = span.enter();
    let mut scan = match tree.open_scan(lo, hi) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "open_scan failed");
            println!("FAIL: {e}");
            return;
        }
    };
    loop {
        match scan.get_next() {
            Ok(Some((key, rid))) => println!("{key} -> ({}, {})", rid.page_no, rid.slot_no),
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "scan failed");
                println!("FAIL: {e}");
                return;
            }
        }
    }
    println!("DONE");
}

fn delete_high_low(tree: &mut BTreeFile<'_>, lo: Option<i32>, hi: Option<i32>) {
    loop {
        let found = {
            let span = tracing::info_span!("open_scan", ?lo, ?hi);
            let _enter = span.enter();
            let mut scan = match tree.open_scan(lo, hi) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "open_scan failed");
                    println!("FAIL: {e}");
                    return;
                }
            };
            scan.get_next()
        };

        let (key, rid) = match found {
            Ok(Some(pair)) => pair,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "scan failed");
                println!("FAIL: {e}");
                return;
            }
        };

        let span = tracing::info_span!("delete", key, page_no = rid.page_no, slot_no = rid.slot_no);
        let _enter = span.enter();
        if let Err(e) = tree.delete(key, rid) {
            tracing::error!(key, error = %e, "delete failed");
            println!("FAIL: {e}");
            return;
        }
    }
    println!("OK");
}

fn delete_scan_high_low(tree: &mut BTreeFile<'_>, lo: Option<i32>, hi: Option<i32>) {
    let span = tracing::info_span!("open_scan", ?lo, ?hi);
    let enter = span.enter();
    let mut scan = match tree.open_scan(lo, hi) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "open_scan failed");
            println!("FAIL: {e}");
            return;
        }
    };
    drop(enter);

    loop {
        match scan.get_next() {
            Ok(Some((key, _))) => {
                let span = tracing::info_span!("delete", key);
                let _enter = span.enter();
                if let Err(e) = scan.delete_current(tree) {
                    tracing::error!(key, error = %e, "delete_current failed");
                    println!("FAIL: {e}");
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "scan failed");
                println!("FAIL: {e}");
                return;
            }
        }
    }
    println!("OK");
}
