use crate::error::AppError;
use crate::models::Role;

/// Защищенные операции. Какие роли их выполняют - только в [`allowed_roles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageUsers,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    ViewEventAttendees,
    ViewOrganizerEvents,
    ViewDashboard,
    RegisterForEvent,
    ListAllBookings,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::ManageUsers,
        Capability::CreateEvent,
        Capability::UpdateEvent,
        Capability::DeleteEvent,
        Capability::ViewEventAttendees,
        Capability::ViewOrganizerEvents,
        Capability::ViewDashboard,
        Capability::RegisterForEvent,
        Capability::ListAllBookings,
    ];
}

// Админ не наследует права организатора
pub fn allowed_roles(capability: Capability) -> &'static [Role] {
    use Capability::*;
    match capability {
        ManageUsers | ListAllBookings => &[Role::Admin],
        CreateEvent | UpdateEvent | ViewEventAttendees | ViewDashboard => &[Role::Organizer],
        DeleteEvent | ViewOrganizerEvents => &[Role::Admin, Role::Organizer],
        RegisterForEvent => &[Role::Attendee],
    }
}

fn denial_message(capability: Capability) -> &'static str {
    match allowed_roles(capability) {
        [Role::Admin] => "Not authorized as admin",
        [Role::Organizer] => "Not authorized as organizer",
        [Role::Attendee] => "Not authorized as an attendee",
        _ => "Not authorized as an organizer or admin",
    }
}

pub fn is_allowed(role: Role, capability: Capability) -> bool {
    allowed_roles(capability).contains(&role)
}

pub fn require(role: Role, capability: Capability) -> Result<(), AppError> {
    if is_allowed(role, capability) {
        Ok(())
    } else {
        Err(AppError::auth(denial_message(capability)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_matches_roles() {
        let expected: [(Capability, [bool; 3]); 9] = [
            // admin, organizer, attendee
            (Capability::ManageUsers, [true, false, false]),
            (Capability::CreateEvent, [false, true, false]),
            (Capability::UpdateEvent, [false, true, false]),
            (Capability::DeleteEvent, [true, true, false]),
            (Capability::ViewEventAttendees, [false, true, false]),
            (Capability::ViewOrganizerEvents, [true, true, false]),
            (Capability::ViewDashboard, [false, true, false]),
            (Capability::RegisterForEvent, [false, false, true]),
            (Capability::ListAllBookings, [true, false, false]),
        ];
        for (capability, allowed) in expected {
            for (role, ok) in [Role::Admin, Role::Organizer, Role::Attendee].into_iter().zip(allowed) {
                assert_eq!(is_allowed(role, capability), ok, "{:?} / {:?}", role, capability);
            }
        }
        assert_eq!(Capability::ALL.len(), expected.len());
    }

    #[test]
    fn denial_names_the_required_role() {
        let err = require(Role::Admin, Capability::CreateEvent).unwrap_err();
        assert!(matches!(err, AppError::Auth(ref m) if m == "Not authorized as organizer"));

        let err = require(Role::Attendee, Capability::DeleteEvent).unwrap_err();
        assert!(matches!(err, AppError::Auth(ref m) if m == "Not authorized as an organizer or admin"));
    }
}
