//! Who is making a request, and what they may do.

use vespawatch_database_models::{ManagementActionRow, ObservationRow, Scope, UserRow};

/// Role derived from a user's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Not logged in.
    Anonymous,
    /// Logged in without staff rights or a zone.
    Member,
    /// Fire-brigade user limited to one zone.
    ZoneScoped {
        /// The zone the user works in.
        zone_id: i64,
    },
    /// Staff: all zones, observation editing, CSV export.
    Staff,
    /// Staff plus user administration.
    Superuser,
}

/// The requesting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    /// Database ID, `None` when anonymous.
    pub user_id: Option<i64>,
    /// Login name, `None` when anonymous.
    pub username: Option<String>,
    /// Effective role.
    pub role: Role,
}

impl Viewer {
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            user_id: None,
            username: None,
            role: Role::Anonymous,
        }
    }

    /// Builds a viewer from a user row. Superuser wins over staff, and staff
    /// wins over a zone.
    #[must_use]
    pub fn from_user(user: &UserRow) -> Self {
        let role = if user.is_superuser {
            Role::Superuser
        } else if user.is_staff {
            Role::Staff
        } else if let Some(zone_id) = user.zone_id {
            Role::ZoneScoped { zone_id }
        } else {
            Role::Member
        };

        Self {
            user_id: Some(user.id),
            username: Some(user.username.clone()),
            role,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        !matches!(self.role, Role::Anonymous)
    }

    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self.role, Role::Staff | Role::Superuser)
    }

    /// Which observations this viewer may see.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        match self.role {
            Role::ZoneScoped { zone_id } => Scope::Zone(zone_id),
            _ => Scope::Everything,
        }
    }

    /// Whether observer contact details are included in observation JSON.
    #[must_use]
    pub const fn sees_observer_contact(&self) -> bool {
        matches!(
            self.role,
            Role::Staff | Role::Superuser | Role::ZoneScoped { .. }
        )
    }

    #[must_use]
    pub const fn can_manage_actions(&self) -> bool {
        self.is_authenticated()
    }

    /// Staff may change any action; others only the ones they recorded.
    #[must_use]
    pub fn can_change_action(&self, action: &ManagementActionRow) -> bool {
        self.is_staff() || (self.user_id.is_some() && self.user_id == action.user_id)
    }

    /// Staff may edit or delete observations that were created here.
    /// Observations pulled from iNaturalist are read-only.
    #[must_use]
    pub const fn can_change_observation(&self, observation: &ObservationRow) -> bool {
        self.is_staff() && observation.can_be_edited_or_deleted()
    }

    #[must_use]
    pub const fn can_export_csv(&self) -> bool {
        self.is_staff()
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use vespawatch_observation_models::ActionResult;

    use super::*;

    fn user(is_staff: bool, is_superuser: bool, zone_id: Option<i64>) -> UserRow {
        UserRow {
            id: 7,
            username: "brandweer".to_string(),
            email: None,
            password_hash: String::new(),
            is_active: true,
            is_staff,
            is_superuser,
            zone_id,
        }
    }

    fn action(user_id: Option<i64>) -> ManagementActionRow {
        ManagementActionRow {
            id: 1,
            nest_id: 2,
            user_id,
            username: None,
            action_time: Utc::now(),
            duration_minutes: None,
            number_of_persons: None,
            comments: String::new(),
            result: ActionResult::SuccessfullyTreated,
            method: None,
            product: None,
            aftercare: None,
            nest_site: None,
            nest_type: None,
            problems: Vec::new(),
        }
    }

    #[test]
    fn anonymous_sees_everything_but_no_contacts() {
        let viewer = Viewer::anonymous();
        assert_eq!(viewer.scope(), Scope::Everything);
        assert!(!viewer.is_authenticated());
        assert!(!viewer.sees_observer_contact());
        assert!(!viewer.can_manage_actions());
        assert!(!viewer.can_export_csv());
        assert!(!viewer.can_change_action(&action(None)));
    }

    #[test]
    fn zone_user_is_scoped_to_their_zone() {
        let viewer = Viewer::from_user(&user(false, false, Some(3)));
        assert_eq!(viewer.role, Role::ZoneScoped { zone_id: 3 });
        assert_eq!(viewer.scope(), Scope::Zone(3));
        assert!(viewer.sees_observer_contact());
        assert!(viewer.can_manage_actions());
        assert!(!viewer.can_export_csv());
    }

    #[test]
    fn zone_user_changes_only_own_actions() {
        let viewer = Viewer::from_user(&user(false, false, Some(3)));
        assert!(viewer.can_change_action(&action(Some(7))));
        assert!(!viewer.can_change_action(&action(Some(8))));
        assert!(!viewer.can_change_action(&action(None)));
    }

    #[test]
    fn staff_wins_over_zone() {
        let viewer = Viewer::from_user(&user(true, false, Some(3)));
        assert_eq!(viewer.role, Role::Staff);
        assert_eq!(viewer.scope(), Scope::Everything);
        assert!(viewer.can_change_action(&action(Some(8))));
        assert!(viewer.can_export_csv());
    }

    #[test]
    fn superuser_is_staff() {
        let viewer = Viewer::from_user(&user(false, true, None));
        assert_eq!(viewer.role, Role::Superuser);
        assert!(viewer.is_staff());
    }

    #[test]
    fn member_without_zone_sees_everything_without_contacts() {
        let viewer = Viewer::from_user(&user(false, false, None));
        assert_eq!(viewer.role, Role::Member);
        assert_eq!(viewer.scope(), Scope::Everything);
        assert!(!viewer.sees_observer_contact());
        assert!(viewer.can_manage_actions());
    }
}
