// Terminal rendering for records

use crossterm::style::Stylize;

use crate::analysis::AnalysisReport;
use crate::characters::Character;
use crate::dialogue::{Dialogue, Message};
use crate::exploration::{ExplorationRound, ExplorationSession, ExplorationSummary, Readiness};
use crate::providers::Role;
use crate::storage::StorageStats;
use crate::validation::ValidationSession;

pub fn success(text: &str) {
    println!("{} {}", "✓".green(), text);
}

pub fn heading(text: &str) {
    println!("{}", text.bold());
}

fn field(label: &str, value: Option<&str>) {
    if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
        println!("  {:<14} {}", format!("{}:", label).dark_grey(), v);
    }
}

fn list(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{}", format!("{}:", label).cyan());
    for item in items {
        println!("  - {}", item);
    }
}

pub fn character_row(c: &Character) {
    println!(
        "{}  {:<24} {:<12} {}",
        c.id.as_str().dark_grey(),
        c.name,
        c.character_type.to_string(),
        c.info.position.as_deref().unwrap_or("")
    );
}

pub fn character(c: &Character) {
    heading(&format!("{} ({})", c.name, c.character_type));
    field("id", Some(&c.id));
    field("description", Some(&c.description));
    if let Some(age) = c.info.age {
        field("age", Some(&age.to_string()));
    }
    field("position", c.info.position.as_deref());
    field("background", c.info.background.as_deref());
    field("experience", c.info.experience.as_deref());
    field("situation", c.context.current_situation.as_deref());
    field("field", c.expertise.professional_field.as_deref());
    field("decisions", c.behavior.decision_style.as_deref());
    field("risk", c.behavior.risk_preference.as_deref());
    field("style", c.behavior.communication_style.as_deref());
    list("Goals", &c.context.goals);
    list("Challenges", &c.context.challenges);
    list("Skills", &c.expertise.special_skills);
    list("Values", &c.behavior.values);
    list("Focus areas", &c.response.focus_areas);
    if !c.tags.is_empty() {
        field("tags", Some(&c.tags.join(", ")));
    }
    let missing = c.missing_fields();
    if !missing.is_empty() {
        println!("{} {}", "Incomplete:".yellow(), missing.join(", "));
    }
}

pub fn message(m: &Message, character_name: &str) {
    let speaker = match m.role {
        Role::User => "You".green().bold(),
        Role::Assistant => character_name.blue().bold(),
        Role::System => "System".dark_grey().bold(),
    };
    println!("{} {}", speaker, m.timestamp.format("%H:%M").to_string().dark_grey());
    println!("{}\n", m.content);
}

pub fn dialogue(d: &Dialogue, character_name: &str) {
    heading(&format!("{} ({})", d.title, d.id));
    println!("{} message(s) with {}\n", d.messages.len(), character_name);
    for m in &d.messages {
        message(m, character_name);
    }
}

pub fn dialogue_row(d: &Dialogue) {
    println!(
        "{}  {:<32} {:>4} msg  {}",
        d.id.as_str().dark_grey(),
        d.title,
        d.messages.len(),
        d.updated_at.format("%Y-%m-%d %H:%M")
    );
}

pub fn round(r: &ExplorationRound) {
    if let Some(focus) = r.focus {
        println!("{} {}", "Focus:".dark_grey(), focus);
    }
    println!("{}", r.reply);
    if r.new_items > 0 {
        println!("{}", format!("(+{} finding(s))", r.new_items).dark_grey());
    }
    if let Some(q) = &r.follow_up_question {
        println!("{} {}", "Next:".yellow(), q);
    }
    println!();
}

fn readiness(r: Readiness) -> String {
    match r {
        Readiness::Ready => r.to_string().green().to_string(),
        Readiness::Partial => r.to_string().yellow().to_string(),
        Readiness::Insufficient => r.to_string().red().to_string(),
    }
}

pub fn summary(s: &ExplorationSummary) {
    heading(&s.initial_idea);
    println!(
        "{} rounds, readiness {}{}\n",
        s.rounds,
        readiness(s.readiness),
        if s.finalized { ", finalized" } else { "" }
    );
    list("Stakeholders", &s.stakeholders);
    list("Domains", &s.domains);
    list("Constraints", &s.constraints);
    list("Environment", &s.environment_notes);
    list("Insights", &s.insights);
    if let Some(q) = &s.open_question {
        println!("{} {}", "Open question:".yellow(), q);
    }
}

pub fn exploration(session: &ExplorationSession) {
    heading(&format!("Exploration {}", session.id));
    for r in &session.rounds {
        println!("{} {}", format!("[{}]", r.index + 1).dark_grey(), r.user_input.as_str().green());
        round(r);
    }
    summary(&session.summary());
}

pub fn exploration_row(s: &ExplorationSession) {
    let idea: String = s.initial_idea.chars().take(40).collect();
    println!(
        "{}  {:<40} {:>3} rounds  {}",
        s.id.as_str().dark_grey(),
        idea,
        s.rounds.len(),
        readiness(s.readiness())
    );
}

pub fn validation(v: &ValidationSession) {
    heading(&v.question);
    println!(
        "{} of {} character(s) responded ({})\n",
        v.responses.len(),
        v.participants.len(),
        v.mode
    );
    for (id, r) in v.ordered_responses() {
        println!(
            "{} {} {}",
            r.character_name.as_str().blue().bold(),
            format!("({})", r.character_type).dark_grey(),
            format!("{} {}ms", id, r.elapsed_ms).dark_grey()
        );
        println!("{}\n", r.content);
    }
    for (id, f) in &v.failures {
        println!("{} {} {}", "✗".red(), id, f);
    }
    for note in &v.notes {
        println!("{} {}", "Note:".yellow(), note);
    }
    if !v.is_complete() {
        println!("{}", "Result is incomplete".yellow().bold());
    }
}

pub fn validation_row(v: &ValidationSession) {
    let question: String = v.question.chars().take(40).collect();
    println!(
        "{}  {:<40} {}/{}",
        v.id.as_str().dark_grey(),
        question,
        v.responses.len(),
        v.participants.len()
    );
}

pub fn report(r: &AnalysisReport) {
    heading(&format!("Report: {}", r.question));
    if r.incomplete {
        println!(
            "{} missing responses from {}",
            "Incomplete:".yellow().bold(),
            r.missing_characters.join(", ")
        );
    }
    println!("\n{}\n", r.summary);
    list("Consensus", &r.consensus);
    list("Conflicts", &r.conflicts);
    list("Opportunities", &r.opportunities);
    list("Risks", &r.risks);
    list("Recommendations", &r.recommendations);
    list("Next steps", &r.next_steps);
}

pub fn stats(s: &StorageStats) {
    heading(&format!("Data directory: {}", s.data_dir.display()));
    for c in &s.collections {
        println!("  {:<14} {:>6} records  {:>10} bytes", c.name, c.records, c.bytes);
    }
    println!(
        "  {:<14} {:>6} records  {:>10} bytes",
        "total".bold(),
        s.total_records(),
        s.total_bytes()
    );
    println!("  {} backup(s)", s.backups);
}
