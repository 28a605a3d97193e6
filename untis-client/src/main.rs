use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};
use tracing_subscriber::EnvFilter;

use untis_client::domain::{Lesson, LessonState, Resource};
use untis_client::{HttpSource, UntisClient, UntisConfig, UntisError};

/// Usage: `untis-client [CLASS-FILTER] [YYYY-MM-DD]`
///
/// Logs in with the account from the environment, lists the classes whose
/// code contains the filter, the period grid and the teachers, then prints
/// one week of the first matching class grouped by lesson state.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = env_or_warn("UNTIS_SERVER");
    let school = env_or_warn("UNTIS_SCHOOL");
    let username = env_or_warn("UNTIS_USERNAME");
    let password = env_or_warn("UNTIS_PASSWORD");

    let mut args = std::env::args().skip(1);
    let filter = args.next().unwrap_or_default();
    let date = match args.next() {
        Some(arg) => match NaiveDate::parse_from_str(&arg, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                eprintln!("Invalid date {arg:?}: {e}");
                std::process::exit(2);
            }
        },
        None => Local::now().date_naive(),
    };

    let source =
        HttpSource::new(UntisConfig::new(server, school)).expect("Failed to create HTTP client");
    let client = UntisClient::new(source);

    match client.login(&username, &password).await {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("Login rejected: bad credentials");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Login failed: {e}");
            std::process::exit(1);
        }
    }

    if let Err(e) = run(&client, &filter, date).await {
        eprintln!("Error: {e}");
    }

    client.close().await;
}

async fn run(
    client: &UntisClient<HttpSource>,
    filter: &str,
    date: NaiveDate,
) -> Result<(), UntisError> {
    let classes = client.classes().await?;
    let matching: Vec<_> = classes
        .iter()
        .filter(|c| c.unique_name().contains(filter))
        .collect();

    println!("Classes matching {filter:?}:");
    for class in &matching {
        let head = class
            .class_teacher
            .as_ref()
            .map(|t| t.unique_name())
            .unwrap_or("-");
        println!("  {class} ({}), head teacher {head}", class.resource.long_name);
    }

    println!();
    println!("Period grid:");
    for period in client.periods().await?.iter() {
        println!(
            "  {:>2}  {} - {}",
            period.nr,
            period.start_time.format("%H:%M"),
            period.end_time.format("%H:%M")
        );
    }

    let teachers = client.teachers().await?;
    println!();
    println!("{} teachers", teachers.len());

    let Some(class) = matching.first() else {
        return Ok(());
    };

    let lessons = client.lessons_for_class(class, date).await?;
    println!();
    println!("Week of {date} for {class}: {} lessons", lessons.len());

    let mut by_state: BTreeMap<u8, (LessonState, Vec<&Lesson>)> = BTreeMap::new();
    for lesson in &lessons {
        by_state
            .entry(lesson.state as u8)
            .or_insert_with(|| (lesson.state, Vec::new()))
            .1
            .push(lesson);
    }

    for (state, lessons) in by_state.values() {
        if *state == LessonState::Standard {
            continue;
        }
        println!();
        println!("{state}:");
        for lesson in lessons {
            println!("  {}", describe(lesson));
        }
    }

    Ok(())
}

fn describe(lesson: &Lesson) -> String {
    let slot = lesson
        .period
        .map(|p| format!("period {p}"))
        .unwrap_or_else(|| lesson.begin.format("%H:%M").to_string());

    let mut line = format!(
        "{} {} {} {}",
        lesson.weekday(),
        slot,
        lesson.subject_names(),
        lesson.room_names()
    );

    for teacher in lesson.teachers.iter().filter(|t| t.is_changed()) {
        let name = |t: Option<&untis_client::domain::Teacher>| {
            t.map(|t| t.unique_name().to_string())
                .unwrap_or_else(|| "?".to_string())
        };
        line.push_str(&format!(
            " {} -> {}",
            name(teacher.original.as_ref()),
            name(teacher.current.as_ref())
        ));
    }

    if !lesson.lesson_text.is_empty() {
        line.push_str(&format!(" ({})", lesson.lesson_text));
    }

    line
}

fn env_or_warn(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        eprintln!("Warning: {name} not set.");
        String::new()
    })
}
