//! Role resolution, temporary sudo grants, per-command role overrides and
//! group mutes.
//!
//! All state lives behind one mutex: no operation here suspends, so a single
//! lock is enough. Sudo grants expire lazily: an expired grant is removed the
//! first time it is looked at.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Duration, Utc};

use crate::{Clock, EngineError, ResultEngine, Role};

#[derive(Clone, Debug)]
pub struct PermissionConfig {
    pub owner: String,
    pub admins: Vec<String>,
    pub sudo_min_minutes: i64,
    pub sudo_max_minutes: i64,
}

impl PermissionConfig {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            admins: Vec::new(),
            sudo_min_minutes: 1,
            sudo_max_minutes: 24 * 60,
        }
    }

    #[must_use]
    pub fn admins<I, S>(mut self, admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admins = admins.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn sudo_bounds(mut self, min_minutes: i64, max_minutes: i64) -> Self {
        self.sudo_min_minutes = min_minutes;
        self.sudo_max_minutes = max_minutes;
        self
    }
}

/// Temporary elevation of a user to admin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SudoGrant {
    pub user_id: String,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SudoGrant {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Whole minutes left, rounded up.
    pub fn minutes_left(&self, now: DateTime<Utc>) -> i64 {
        let seconds = (self.expires_at - now).num_seconds().max(0);
        (seconds + 59) / 60
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MuteRecord {
    pub group_id: String,
    pub user_id: String,
    pub muted_by: String,
    pub muted_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct PermissionState {
    admins: HashSet<String>,
    sudo: HashMap<String, SudoGrant>,
    mutes: HashMap<(String, String), MuteRecord>,
    overrides: HashMap<String, Role>,
}

impl PermissionState {
    /// Returns the active grant for `user`, evicting it if it expired.
    fn active_grant(&mut self, user: &str, now: DateTime<Utc>) -> Option<&SudoGrant> {
        let expired = self.sudo.get(user).is_some_and(|grant| !grant.is_active(now));
        if expired {
            tracing::debug!("sudo grant for {user} expired");
            self.sudo.remove(user);
        }
        self.sudo.get(user)
    }
}

#[derive(Debug)]
pub struct PermissionEngine {
    owner: String,
    sudo_min_minutes: i64,
    sudo_max_minutes: i64,
    clock: Arc<dyn Clock>,
    state: Mutex<PermissionState>,
}

impl PermissionEngine {
    pub fn new(config: PermissionConfig, clock: Arc<dyn Clock>) -> Self {
        let state = PermissionState {
            admins: config
                .admins
                .into_iter()
                .filter(|admin| *admin != config.owner)
                .collect(),
            ..Default::default()
        };
        Self {
            owner: config.owner,
            sudo_min_minutes: config.sudo_min_minutes,
            sudo_max_minutes: config.sudo_max_minutes,
            clock,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, PermissionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn static_role(&self, state: &PermissionState, user: &str) -> Role {
        if user == self.owner {
            Role::Owner
        } else if state.admins.contains(user) {
            Role::Admin
        } else {
            Role::Citizen
        }
    }

    fn require(&self, state: &PermissionState, requester: &str, required: Role) -> ResultEngine<()> {
        let role = self.static_role(state, requester);
        if role.satisfies(required) {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied(format!(
                "{required} role required, {requester} is {role}"
            )))
        }
    }

    /// Like [`Self::require`], but an active sudo grant counts as admin.
    fn require_effective(
        &self,
        state: &mut PermissionState,
        requester: &str,
        required: Role,
    ) -> ResultEngine<()> {
        let now = self.clock.now();
        if state.active_grant(requester, now).is_some() && Role::Admin.satisfies(required) {
            return Ok(());
        }
        self.require(state, requester, required)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn sudo_bounds(&self) -> (i64, i64) {
        (self.sudo_min_minutes, self.sudo_max_minutes)
    }

    /// Static role from configuration (and runtime admin edits).
    pub fn role_of(&self, user: &str) -> Role {
        let state = self.state();
        self.static_role(&state, user)
    }

    /// Static role, raised to admin while a sudo grant is active.
    pub fn effective_role(&self, user: &str) -> Role {
        let now = self.clock.now();
        let mut state = self.state();
        let role = self.static_role(&state, user);
        if state.active_grant(user, now).is_some() {
            role.max(Role::Admin)
        } else {
            role
        }
    }

    pub fn grant_sudo(
        &self,
        target: &str,
        grantor: &str,
        duration_minutes: i64,
    ) -> ResultEngine<SudoGrant> {
        let mut state = self.state();
        self.require(&state, grantor, Role::Admin)?;

        if duration_minutes < self.sudo_min_minutes || duration_minutes > self.sudo_max_minutes {
            return Err(EngineError::InvalidDuration(duration_minutes));
        }

        let now = self.clock.now();
        let grant = SudoGrant {
            user_id: target.to_string(),
            granted_by: grantor.to_string(),
            granted_at: now,
            expires_at: now + Duration::minutes(duration_minutes),
        };
        state.sudo.insert(target.to_string(), grant.clone());
        tracing::info!("granted sudo to {target} for {duration_minutes} minutes by {grantor}");
        Ok(grant)
    }

    pub fn revoke_sudo(&self, target: &str, grantor: &str) -> ResultEngine<SudoGrant> {
        let now = self.clock.now();
        let mut state = self.state();
        self.require(&state, grantor, Role::Admin)?;

        if state.active_grant(target, now).is_none() {
            return Err(EngineError::NotFound(format!("sudo grant for {target}")));
        }
        let grant = state
            .sudo
            .remove(target)
            .ok_or_else(|| EngineError::NotFound(format!("sudo grant for {target}")))?;
        tracing::info!("revoked sudo from {target} by {grantor}");
        Ok(grant)
    }

    pub fn sudo_grant(&self, user: &str) -> Option<SudoGrant> {
        let now = self.clock.now();
        self.state().active_grant(user, now).cloned()
    }

    /// Active grants, soonest expiry first. Expired grants are dropped.
    pub fn active_sudo_grants(&self) -> Vec<SudoGrant> {
        let now = self.clock.now();
        let mut state = self.state();
        state.sudo.retain(|_, grant| grant.is_active(now));
        let mut grants: Vec<SudoGrant> = state.sudo.values().cloned().collect();
        grants.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then(a.user_id.cmp(&b.user_id)));
        grants
    }

    pub fn set_command_role(&self, command: &str, role: Role, requester: &str) -> ResultEngine<()> {
        let mut state = self.state();
        self.require(&state, requester, Role::Owner)?;
        state.overrides.insert(command.to_string(), role);
        tracing::info!("command role updated: {command} -> {role} by {requester}");
        Ok(())
    }

    /// Removes an override; returns the role that was overridden, if any.
    pub fn clear_command_role(&self, command: &str, requester: &str) -> ResultEngine<Option<Role>> {
        let mut state = self.state();
        self.require(&state, requester, Role::Owner)?;
        let previous = state.overrides.remove(command);
        if previous.is_some() {
            tracing::info!("command role override removed: {command} by {requester}");
        }
        Ok(previous)
    }

    /// Minimum role for `command`: the runtime override when present,
    /// otherwise the role the command declared.
    pub fn resolved_min_role(&self, command: &str, declared: Role) -> Role {
        self.state()
            .overrides
            .get(command)
            .copied()
            .unwrap_or(declared)
    }

    pub fn has_permission(&self, user: &str, command: &str, declared: Role) -> bool {
        let required = self.resolved_min_role(command, declared);
        self.effective_role(user).satisfies(required)
    }

    /// Moderation is open to sudo holders as well as static admins.
    pub fn mute(&self, target: &str, group: &str, requester: &str) -> ResultEngine<MuteRecord> {
        let mut state = self.state();
        self.require_effective(&mut state, requester, Role::Admin)?;

        let record = MuteRecord {
            group_id: group.to_string(),
            user_id: target.to_string(),
            muted_by: requester.to_string(),
            muted_at: self.clock.now(),
        };
        state
            .mutes
            .insert((group.to_string(), target.to_string()), record.clone());
        tracing::info!("user {target} muted in group {group} by {requester}");
        Ok(record)
    }

    pub fn unmute(&self, target: &str, group: &str, requester: &str) -> ResultEngine<MuteRecord> {
        let mut state = self.state();
        self.require_effective(&mut state, requester, Role::Admin)?;

        let record = state
            .mutes
            .remove(&(group.to_string(), target.to_string()))
            .ok_or_else(|| EngineError::NotFound(format!("mute for {target} in {group}")))?;
        tracing::info!("user {target} unmuted in group {group} by {requester}");
        Ok(record)
    }

    pub fn is_muted(&self, target: &str, group: &str) -> bool {
        self.state()
            .mutes
            .contains_key(&(group.to_string(), target.to_string()))
    }

    pub fn muted_in_group(&self, group: &str) -> Vec<MuteRecord> {
        let mut records: Vec<MuteRecord> = self
            .state()
            .mutes
            .values()
            .filter(|record| record.group_id == group)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.muted_at.cmp(&b.muted_at));
        records
    }

    pub fn add_admin(&self, user: &str, requester: &str) -> ResultEngine<()> {
        let mut state = self.state();
        self.require(&state, requester, Role::Owner)?;

        if user == self.owner {
            return Err(EngineError::InvalidArgument(
                "the owner is already above admin".to_string(),
            ));
        }
        if !state.admins.insert(user.to_string()) {
            return Err(EngineError::InvalidArgument(format!("{user} is already an admin")));
        }
        tracing::info!("added {user} as admin by {requester}");
        Ok(())
    }

    pub fn remove_admin(&self, user: &str, requester: &str) -> ResultEngine<()> {
        let mut state = self.state();
        self.require(&state, requester, Role::Owner)?;

        if !state.admins.remove(user) {
            return Err(EngineError::NotFound(format!("admin {user}")));
        }
        tracing::info!("removed {user} from admins by {requester}");
        Ok(())
    }

    /// Sorted admin identifiers (the owner is not included).
    pub fn admins(&self) -> Vec<String> {
        let mut admins: Vec<String> = self.state().admins.iter().cloned().collect();
        admins.sort();
        admins
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::ManualClock;

    fn engine() -> (PermissionEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let config = PermissionConfig::new("owner").admins(["admin"]);
        (PermissionEngine::new(config, clock.clone()), clock)
    }

    #[test]
    fn static_roles_come_from_configuration() {
        let (perms, _) = engine();
        assert_eq!(perms.role_of("owner"), Role::Owner);
        assert_eq!(perms.role_of("admin"), Role::Admin);
        assert_eq!(perms.role_of("someone"), Role::Citizen);
    }

    #[test]
    fn sudo_grant_expires_lazily() {
        let (perms, clock) = engine();
        perms.grant_sudo("u", "admin", 60).unwrap();

        clock.advance(Duration::minutes(30));
        assert_eq!(perms.effective_role("u"), Role::Admin);
        assert_eq!(perms.role_of("u"), Role::Citizen);

        clock.advance(Duration::minutes(31));
        assert_eq!(perms.effective_role("u"), Role::Citizen);
        assert!(perms.sudo_grant("u").is_none());
    }

    #[test]
    fn grant_is_inactive_exactly_at_expiry() {
        let (perms, clock) = engine();
        perms.grant_sudo("u", "admin", 10).unwrap();
        clock.advance(Duration::minutes(10));
        assert_eq!(perms.effective_role("u"), Role::Citizen);
    }

    #[test]
    fn new_grant_replaces_old_one() {
        let (perms, clock) = engine();
        perms.grant_sudo("u", "admin", 10).unwrap();
        clock.advance(Duration::minutes(5));
        let second = perms.grant_sudo("u", "owner", 60).unwrap();

        assert_eq!(perms.sudo_grant("u"), Some(second));
        assert_eq!(perms.active_sudo_grants().len(), 1);

        clock.advance(Duration::minutes(20));
        assert_eq!(perms.effective_role("u"), Role::Admin);
    }

    #[test]
    fn citizens_and_sudo_users_cannot_grant_sudo() {
        let (perms, _) = engine();
        assert!(matches!(
            perms.grant_sudo("x", "someone", 60),
            Err(EngineError::PermissionDenied(_))
        ));

        // Sudo elevates the effective role only; grants need a static admin.
        perms.grant_sudo("helper", "admin", 60).unwrap();
        assert!(matches!(
            perms.grant_sudo("x", "helper", 60),
            Err(EngineError::PermissionDenied(_))
        ));
    }

    #[test]
    fn duration_outside_bounds_is_rejected() {
        let (perms, _) = engine();
        assert_eq!(
            perms.grant_sudo("u", "admin", 0),
            Err(EngineError::InvalidDuration(0))
        );
        assert_eq!(
            perms.grant_sudo("u", "admin", 24 * 60 + 1),
            Err(EngineError::InvalidDuration(24 * 60 + 1))
        );
        assert!(perms.grant_sudo("u", "admin", 24 * 60).is_ok());
    }

    #[test]
    fn revoke_requires_an_active_grant() {
        let (perms, clock) = engine();
        assert!(matches!(
            perms.revoke_sudo("u", "admin"),
            Err(EngineError::NotFound(_))
        ));

        perms.grant_sudo("u", "admin", 5).unwrap();
        assert!(matches!(
            perms.revoke_sudo("u", "someone"),
            Err(EngineError::PermissionDenied(_))
        ));
        assert!(perms.revoke_sudo("u", "admin").is_ok());
        assert_eq!(perms.effective_role("u"), Role::Citizen);

        perms.grant_sudo("u", "admin", 5).unwrap();
        clock.advance(Duration::minutes(6));
        assert!(matches!(
            perms.revoke_sudo("u", "admin"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn overrides_are_owner_only_and_take_precedence() {
        let (perms, _) = engine();
        assert!(perms.has_permission("someone", "balance", Role::Citizen));

        assert!(matches!(
            perms.set_command_role("balance", Role::Admin, "admin"),
            Err(EngineError::PermissionDenied(_))
        ));
        perms.set_command_role("balance", Role::Admin, "owner").unwrap();

        assert_eq!(perms.resolved_min_role("balance", Role::Citizen), Role::Admin);
        assert!(!perms.has_permission("someone", "balance", Role::Citizen));
        assert!(perms.has_permission("admin", "balance", Role::Citizen));

        assert_eq!(
            perms.clear_command_role("balance", "owner").unwrap(),
            Some(Role::Admin)
        );
        assert!(perms.has_permission("someone", "balance", Role::Citizen));
    }

    #[test]
    fn sudo_counts_for_command_permission() {
        let (perms, _) = engine();
        assert!(!perms.has_permission("u", "mute", Role::Admin));
        perms.grant_sudo("u", "admin", 60).unwrap();
        assert!(perms.has_permission("u", "mute", Role::Admin));
        assert!(!perms.has_permission("u", "addadmin", Role::Owner));
    }

    #[test]
    fn mutes_are_per_group() {
        let (perms, _) = engine();
        assert!(matches!(
            perms.mute("u", "g1", "someone"),
            Err(EngineError::PermissionDenied(_))
        ));

        perms.mute("u", "g1", "admin").unwrap();
        assert!(perms.is_muted("u", "g1"));
        assert!(!perms.is_muted("u", "g2"));
        assert_eq!(perms.muted_in_group("g1").len(), 1);

        perms.grant_sudo("helper", "admin", 60).unwrap();
        perms.mute("v", "g1", "helper").unwrap();
        assert_eq!(perms.muted_in_group("g1").len(), 2);
        perms.unmute("v", "g1", "helper").unwrap();

        perms.unmute("u", "g1", "admin").unwrap();
        assert!(!perms.is_muted("u", "g1"));
        assert!(matches!(
            perms.unmute("u", "g1", "admin"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn admin_set_is_owner_editable() {
        let (perms, _) = engine();
        assert!(matches!(
            perms.add_admin("u", "admin"),
            Err(EngineError::PermissionDenied(_))
        ));

        perms.add_admin("u", "owner").unwrap();
        assert_eq!(perms.role_of("u"), Role::Admin);
        assert!(matches!(
            perms.add_admin("u", "owner"),
            Err(EngineError::InvalidArgument(_))
        ));

        perms.remove_admin("u", "owner").unwrap();
        assert_eq!(perms.role_of("u"), Role::Citizen);
        assert!(matches!(
            perms.remove_admin("u", "owner"),
            Err(EngineError::NotFound(_))
        ));
        assert_eq!(perms.admins(), vec!["admin".to_string()]);
    }
}
