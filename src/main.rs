use beacon::config::BeaconConfig;
use beacon::core::time;
use beacon::data::brain::BrainClient;
use beacon::data::storage::WriteLayer;
use beacon::data::{
    agent_store::AgentStore, brain_store::BrainStore, calendar_store::CalendarStore,
    spend_store::{Period, SpendStore}, task_store::TaskStore, DataService, Source, StatusMap,
};
use beacon::core::task::TaskStatus;

#[tokio::main]
async fn main() {
    let config = BeaconConfig::load();

    // Log to the systemd user journal (`journalctl --user -t beacon -f`).
    // Wrapper filters: beacon crate at info/debug (per config), everything else at warn.
    {
        struct FilteredJournal {
            inner: systemd_journal_logger::JournalLog,
        }

        impl log::Log for FilteredJournal {
            fn enabled(&self, metadata: &log::Metadata) -> bool {
                if metadata.target().starts_with("beacon") {
                    let max = if beacon::debug_logging() {
                        log::LevelFilter::Debug
                    } else {
                        log::LevelFilter::Info
                    };
                    metadata.level() <= max
                } else {
                    metadata.level() <= log::LevelFilter::Warn
                }
            }
            fn log(&self, record: &log::Record) {
                if self.enabled(record.metadata()) {
                    self.inner.log(record);
                }
            }
            fn flush(&self) {
                self.inner.flush();
            }
        }

        let journal = systemd_journal_logger::JournalLog::new()
            .unwrap()
            .with_syslog_identifier("beacon".to_string());

        beacon::set_debug_logging(config.debug_logging);

        log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).unwrap();
        // Global max must be Debug so beacon debug logs can pass through when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }

    // Parse CLI flags
    let args: Vec<String> = std::env::args().collect();
    let search_query = flag_value(&args, "--search");
    let refresh_source = flag_value(&args, "--refresh").and_then(|s| Source::parse(&s));

    if let Err(e) = config.ensure_dirs() {
        println!("Failed to create data dir: {}", e);
        return;
    }

    let mut service = match DataService::new(&config) {
        Ok(s) => s,
        Err(e) => {
            println!("Failed to set up data service: {}", e);
            return;
        }
    };

    service.on_status_change(|status| print_status_bar(status));

    println!("=== Mission Control ===\n");
    println!("Fetching sources from {} ...", config.data_url);
    service.init().await;

    if let Some(source) = refresh_source {
        println!("Refreshing {} ...", source.as_str());
        service.refresh(source).await;
    }

    let storage = WriteLayer::new(&config.data_dir);

    let mut tasks = TaskStore::new();
    tasks.load(&service, &storage);

    let mut calendar = CalendarStore::new();
    calendar.load(&service);

    let mut spend = SpendStore::new();
    spend.load(&service);

    let mut agents = AgentStore::new();
    agents.load(&service, &storage);

    let brain_client = match BrainClient::new(&config.brain_url) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to set up brain client: {}", e);
            return;
        }
    };
    let mut brain = BrainStore::new(brain_client);
    brain.load(&service);

    let today = time::today();
    let now = time::now();

    println!("\n--- Tasks ---");
    for status in TaskStatus::ALL {
        println!("  {:<12} {}", status.as_str(), tasks.by_status(status).len());
    }
    println!("  active: {}, critical: {}", tasks.active_count(), tasks.critical_count());

    println!("\n--- Calendar ({}) ---", calendar.freshness(now).label);
    for event in calendar.today(today) {
        println!("  {} {}", event.start.format("%H:%M"), event.title);
    }
    for event in calendar.upcoming(now, 3) {
        println!("  upcoming: {} {}", event.start.format("%m-%d %H:%M"), event.title);
    }

    println!("\n--- Spend ---");
    match spend.total_for_period(Period::Day, today) {
        Some(cost) => println!("  today: ${:.2}", cost),
        None => println!("  today: no data"),
    }
    match spend.total_for_period(Period::Week, today) {
        Some(cost) => println!("  last 7 days: ${:.2}", cost),
        None => println!("  last 7 days: no data"),
    }
    if let Some(top) = spend.most_expensive_model(Period::Week, today) {
        println!("  top model: {} (${:.2})", top.display_name, top.cost);
    }

    println!("\n--- Agents ---");
    for agent in agents.agents() {
        println!(
            "  [{}] {} ({}) — {}",
            agent.status.as_str(),
            agent.name,
            agent.kind.as_str(),
            agent.capabilities.join(", ")
        );
    }

    println!("\n--- Second Brain ---");
    println!("  status: {}", brain.status().as_str());

    if let Some(query) = search_query {
        println!("\n--- Search: \"{}\" ---", query);
        let outcome = brain.search(&query, 10).await;
        match outcome.error {
            Some(e) => println!("  {}", e),
            None if outcome.results.is_empty() => println!("  no matches"),
            None => {
                for result in &outcome.results {
                    println!("  [{:.2}] {}", result.score, result.content);
                }
            }
        }
    }

    println!("\n=== Done ===");
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Status-bar analog: one line per notification cycle.
fn print_status_bar(status: &StatusMap) {
    let line = Source::ALL
        .iter()
        .filter_map(|s| {
            status
                .get(s)
                .map(|h| format!("{}:{}", s.as_str(), h.status.as_str()))
        })
        .collect::<Vec<_>>()
        .join(" | ");
    println!("[sources] {}", line);
}
