//! Ledger state and the history coalescing algorithm
//!
//! The ledger is the single shared record every client renders. Mutations are
//! plain methods on [`Ledger`]; callers are responsible for serializing them
//! (see [`crate::EventProcessor`]).

use crate::error::{LedgerError, LedgerResult};
use crate::types::{HistoryEntry, User, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shared ledger of users, price and debt history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    users: Vec<User>,

    price: f64,

    history: Vec<HistoryEntry>,

    /// Next id handed out by `add_user`; decoupled from array position
    #[serde(default)]
    next_user_id: UserId,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn next_user_id(&self) -> UserId {
        self.next_user_id
    }

    /// Look up a user by id
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Append a new user with zero debt and return it
    pub fn add_user(&mut self, name: impl Into<String>) -> User {
        let user = User::new(self.next_user_id, name);
        self.next_user_id += 1;
        self.users.push(user.clone());
        user
    }

    /// Set a user's debt and record the change in history
    ///
    /// Unknown ids and changes whose delta does not fit in an `i64` are
    /// rejected without touching the ledger.
    pub fn update_debt(
        &mut self,
        id: UserId,
        debt: i64,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> LedgerResult<()> {
        let index = self.users.iter().position(|u| u.id == id).ok_or(LedgerError::UserNotFound(id))?;
        let delta = debt.checked_sub(self.users[index].debt).ok_or(LedgerError::DebtOverflow(id))?;

        self.record_history(id, delta, now, window)?;
        self.users[index].debt = debt;
        Ok(())
    }

    /// Set the shared price
    pub fn set_price(&mut self, price: f64) {
        self.price = price;
    }

    /// Return to a fresh ledger, optionally keeping participants with zeroed debt
    pub fn reset(&mut self, keep_participants: bool) {
        self.history.clear();

        if keep_participants {
            for user in &mut self.users {
                user.debt = 0;
            }
        } else {
            self.users.clear();
            self.next_user_id = 0;
        }
    }

    /// Repair the id counter after loading a ledger written without it
    pub fn normalize(&mut self) {
        let floor = self.users.iter().map(|u| u.id.saturating_add(1)).max().unwrap_or(0);
        self.next_user_id = self.next_user_id.max(floor);
    }

    /// Merge `delta` into the last history entry or append a new one
    ///
    /// The window is anchored to the last entry's original timestamp, so a burst
    /// of edits splits once it outlives the first edit by `window`, regardless of
    /// how close together the individual edits are.
    ///
    /// Fails before changing anything if the merged delta would overflow.
    fn record_history(
        &mut self,
        user_id: UserId,
        delta: i64,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> LedgerResult<()> {
        if let Some(last) = self.history.last_mut() {
            // A window end past the representable range never closes
            let in_window = now >= last.timestamp
                && last.timestamp.checked_add_signed(window).map_or(true, |end| now < end);

            if last.target_user_id == user_id && in_window {
                last.bars_delta =
                    last.bars_delta.checked_add(delta).ok_or(LedgerError::DebtOverflow(user_id))?;
                if last.bars_delta == 0 {
                    // round trip cancels out
                    self.history.pop();
                }
                return Ok(());
            }
        }

        self.history.push(HistoryEntry::new(now, user_id, delta));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn window() -> Duration {
        Duration::minutes(2)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn ledger_with_users(names: &[&str]) -> Ledger {
        let mut ledger = Ledger::new();
        for name in names {
            ledger.add_user(*name);
        }
        ledger
    }

    #[test]
    fn test_user_ids_follow_insertion_order() {
        let ledger = ledger_with_users(&["A", "B", "C", "D"]);

        let ids: Vec<UserId> = ledger.users().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(ledger.next_user_id(), 4);
        assert!(ledger.users().iter().all(|u| u.debt == 0));
    }

    #[test]
    fn test_first_edit_appends_entry() {
        let mut ledger = ledger_with_users(&["A"]);

        ledger.update_debt(0, 3, t0(), window()).unwrap();

        assert_eq!(ledger.history(), &[HistoryEntry::new(t0(), 0, 3)]);
        assert_eq!(ledger.user(0).unwrap().debt, 3);
    }

    #[test]
    fn test_same_user_edits_merge_within_window() {
        let mut ledger = ledger_with_users(&["A", "B"]);

        ledger.update_debt(1, 10, t0(), window()).unwrap();
        ledger.update_debt(1, 7, t0() + Duration::seconds(50), window()).unwrap();

        assert_eq!(ledger.history(), &[HistoryEntry::new(t0(), 1, 7)]);
        assert_eq!(ledger.user(1).unwrap().debt, 7);
    }

    #[test]
    fn test_net_zero_burst_leaves_no_entry() {
        let mut ledger = ledger_with_users(&["A"]);

        ledger.update_debt(0, 5, t0(), window()).unwrap();
        ledger.update_debt(0, 0, t0() + Duration::seconds(10), window()).unwrap();

        assert!(ledger.history().is_empty());
        assert_eq!(ledger.user(0).unwrap().debt, 0);
    }

    #[test]
    fn test_net_zero_removes_only_last_entry() {
        let mut ledger = ledger_with_users(&["A", "B"]);

        ledger.update_debt(0, 2, t0(), window()).unwrap();
        ledger.update_debt(1, 4, t0() + Duration::seconds(1), window()).unwrap();
        ledger.update_debt(1, 0, t0() + Duration::seconds(2), window()).unwrap();

        assert_eq!(ledger.history(), &[HistoryEntry::new(t0(), 0, 2)]);
    }

    #[test]
    fn test_different_users_do_not_merge() {
        let mut ledger = ledger_with_users(&["A", "B"]);

        ledger.update_debt(0, 1, t0(), window()).unwrap();
        ledger.update_debt(1, 1, t0() + Duration::seconds(5), window()).unwrap();

        assert_eq!(ledger.history().len(), 2);
        assert_eq!(ledger.history()[0].target_user_id, 0);
        assert_eq!(ledger.history()[1].target_user_id, 1);
    }

    #[test]
    fn test_edit_after_window_starts_new_entry() {
        let mut ledger = ledger_with_users(&["A"]);

        ledger.update_debt(0, 1, t0(), window()).unwrap();
        ledger.update_debt(0, 2, t0() + Duration::minutes(3), window()).unwrap();

        assert_eq!(
            ledger.history(),
            &[HistoryEntry::new(t0(), 0, 1), HistoryEntry::new(t0() + Duration::minutes(3), 0, 1)]
        );
    }

    #[test]
    fn test_window_is_anchored_to_first_edit_in_burst() {
        let mut ledger = ledger_with_users(&["A"]);

        // Edits every 50 seconds: each is close to the previous one, but the third
        // lands 150 seconds after the first and must open a new entry.
        ledger.update_debt(0, 1, t0(), window()).unwrap();
        ledger.update_debt(0, 2, t0() + Duration::seconds(50), window()).unwrap();
        ledger.update_debt(0, 3, t0() + Duration::seconds(100), window()).unwrap();
        ledger.update_debt(0, 4, t0() + Duration::seconds(150), window()).unwrap();

        assert_eq!(
            ledger.history(),
            &[HistoryEntry::new(t0(), 0, 3), HistoryEntry::new(t0() + Duration::seconds(150), 0, 1)]
        );
    }

    #[test]
    fn test_window_end_is_exclusive() {
        let mut ledger = ledger_with_users(&["A"]);

        ledger.update_debt(0, 1, t0(), window()).unwrap();
        ledger.update_debt(0, 2, t0() + window(), window()).unwrap();

        assert_eq!(ledger.history().len(), 2);
    }

    #[test]
    fn test_clock_going_backwards_starts_new_entry() {
        let mut ledger = ledger_with_users(&["A"]);

        ledger.update_debt(0, 1, t0(), window()).unwrap();
        ledger.update_debt(0, 2, t0() - Duration::seconds(1), window()).unwrap();

        assert_eq!(ledger.history().len(), 2);
    }

    #[test]
    fn test_merged_timestamp_is_not_refreshed() {
        let mut ledger = ledger_with_users(&["A"]);

        ledger.update_debt(0, 1, t0(), window()).unwrap();
        ledger.update_debt(0, 5, t0() + Duration::seconds(90), window()).unwrap();

        assert_eq!(ledger.history()[0].timestamp, t0());
        assert_eq!(ledger.history()[0].bars_delta, 5);
    }

    #[test]
    fn test_unknown_user_is_rejected_without_side_effects() {
        let mut ledger = ledger_with_users(&["A"]);
        let before = ledger.clone();

        let result = ledger.update_debt(42, 10, t0(), window());

        assert!(matches!(result, Err(LedgerError::UserNotFound(42))));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_debt_swing_beyond_i64_is_rejected() {
        let mut ledger = ledger_with_users(&["A"]);
        ledger.update_debt(0, i64::MAX, t0(), window()).unwrap();
        let before = ledger.clone();

        let result = ledger.update_debt(0, i64::MIN, t0() + Duration::seconds(1), window());

        assert!(matches!(result, Err(LedgerError::DebtOverflow(0))));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_merged_delta_beyond_i64_is_rejected() {
        let mut ledger = ledger_with_users(&["A"]);
        ledger.update_debt(0, i64::MAX, t0(), window()).unwrap();
        ledger.update_debt(0, 0, t0() + Duration::minutes(3), window()).unwrap();
        let before = ledger.clone();

        // -i64::MAX already in the open entry; merging i64::MIN would wrap
        let result = ledger.update_debt(0, i64::MIN, t0() + Duration::minutes(4), window());

        assert!(matches!(result, Err(LedgerError::DebtOverflow(0))));
        assert_eq!(ledger, before);
        assert_eq!(ledger.user(0).unwrap().debt, 0);
    }

    #[test]
    fn test_unbounded_window_keeps_merging() {
        let mut ledger = ledger_with_users(&["A"]);
        let forever = Duration::milliseconds(i64::MAX);

        ledger.update_debt(0, 1, t0(), forever).unwrap();
        ledger.update_debt(0, 4, t0() + Duration::days(365), forever).unwrap();

        assert_eq!(ledger.history(), &[HistoryEntry::new(t0(), 0, 4)]);
    }

    #[test]
    fn test_reset_keeping_participants() {
        let mut ledger = ledger_with_users(&["A", "B"]);
        ledger.update_debt(0, 4, t0(), window()).unwrap();
        ledger.update_debt(1, 6, t0(), window()).unwrap();
        ledger.set_price(1.5);

        ledger.reset(true);

        assert_eq!(ledger.users().len(), 2);
        assert!(ledger.users().iter().all(|u| u.debt == 0));
        assert!(ledger.history().is_empty());
        assert_eq!(ledger.add_user("C").id, 2);
    }

    #[test]
    fn test_reset_dropping_participants() {
        let mut ledger = ledger_with_users(&["A", "B"]);
        ledger.update_debt(0, 4, t0(), window()).unwrap();

        ledger.reset(false);

        assert!(ledger.users().is_empty());
        assert!(ledger.history().is_empty());
        assert_eq!(ledger.add_user("C").id, 0);
    }

    #[test]
    fn test_normalize_repairs_missing_counter() {
        let json = r#"{"users":[{"id":0,"name":"A","debt":0},{"id":1,"name":"B","debt":3}],"price":2.0,"history":[]}"#;
        let mut ledger: Ledger = serde_json::from_str(json).unwrap();
        assert_eq!(ledger.next_user_id(), 0);

        ledger.normalize();

        assert_eq!(ledger.next_user_id(), 2);
        assert_eq!(ledger.add_user("C").id, 2);
    }

    #[test]
    fn test_ledger_wire_format() {
        let mut ledger = ledger_with_users(&["A"]);
        ledger.update_debt(0, 2, t0(), window()).unwrap();

        let value = serde_json::to_value(&ledger).unwrap();
        assert_eq!(value["users"][0]["name"], "A");
        assert_eq!(value["history"][0]["targetUserId"], 0);
        assert_eq!(value["history"][0]["barsDelta"], 2);
        assert_eq!(value["nextUserId"], 1);
    }
}
