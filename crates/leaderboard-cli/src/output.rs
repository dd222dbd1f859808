//! Plain-text rendering of query responses.

use std::fmt::Write as _;

use leaderboard_types::{
    ActivityResponse, DeadLettersResponse, RankResponse, StatsResponse, TopResponse,
};

/// Rank, score and percentile on one line.
pub fn rank(response: &RankResponse) -> String {
    format!(
        "{} rank {}/{} score {} percentile {:.1} updated {}",
        response.entity_id,
        response.rank,
        response.total,
        response.score,
        response.percentile,
        response.last_updated.to_rfc3339(),
    )
}

/// Ranked table with a header.
pub fn top(response: &TopResponse) -> String {
    let mut out = format!("{:>6}  {:<32} {:>12}\n", "RANK", "ENTITY", "SCORE");
    for entry in &response.entries {
        let _ = writeln!(
            out,
            "{:>6}  {:<32} {:>12}",
            entry.rank, entry.entity_id, entry.score
        );
    }
    let _ = write!(out, "{} of {} entities", response.count, response.total);
    out
}

/// Activity table; estimates never undercount.
pub fn activity(response: &ActivityResponse) -> String {
    let mut out = format!("{:<32} {:>12}\n", "ENTITY", "~UPDATES");
    for entry in &response.entries {
        let _ = writeln!(out, "{:<32} {:>12}", entry.entity_id, entry.estimated_updates);
    }
    let _ = write!(out, "{} entities (approximate)", response.count);
    out
}

/// Counters as `key: value` lines.
pub fn stats(response: &StatsResponse) -> String {
    let snapshot = response
        .last_snapshot_sequence
        .map_or_else(|| "none".to_owned(), |s| s.to_string());
    format!(
        "phase:              {}\n\
         entities:           {}\n\
         revision:           {}\n\
         events received:    {}\n\
         events applied:     {}\n\
         duplicates skipped: {}\n\
         dead letters:       {}\n\
         last snapshot:      {snapshot}",
        response.phase,
        response.entities,
        response.revision,
        response.events_received,
        response.events_applied,
        response.duplicates_skipped,
        response.dead_letters,
    )
}

/// Newest dead letters first.
pub fn dead_letters(response: &DeadLettersResponse) -> String {
    let mut out = String::new();
    for record in &response.records {
        let _ = writeln!(
            out,
            "{} {}@{} [{}] {}\n    {}",
            record.received_at.to_rfc3339(),
            record.partition,
            record.offset,
            record.kind,
            record.reason,
            record.payload,
        );
    }
    let _ = write!(
        out,
        "showing {} of {} dead letters",
        response.records.len(),
        response.total
    );
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use leaderboard_types::{EntityId, RankedEntry};

    use super::*;

    #[test]
    fn top_lists_entries_in_order() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
        let response = TopResponse {
            offset: 0,
            count: 2,
            total: 3,
            entries: vec![
                RankedEntry {
                    rank: 1,
                    entity_id: EntityId::parse("b").unwrap(),
                    score: 200,
                    last_updated: at,
                },
                RankedEntry {
                    rank: 2,
                    entity_id: EntityId::parse("c").unwrap(),
                    score: 150,
                    last_updated: at,
                },
            ],
        };

        let text = top(&response);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines.get(1).unwrap().contains(" b "));
        assert!(lines.get(2).unwrap().contains(" c "));
        assert_eq!(lines.get(3).unwrap(), &"2 of 3 entities");
    }

    #[test]
    fn stats_without_snapshot() {
        let response = StatsResponse {
            entities: 0,
            revision: 0,
            events_received: 0,
            events_applied: 0,
            duplicates_skipped: 0,
            dead_letters: 0,
            last_snapshot_sequence: None,
            phase: "running".to_owned(),
        };
        assert!(stats(&response).ends_with("last snapshot:      none"));
    }
}
