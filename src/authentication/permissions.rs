use crate::{jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnRelations,
            ActionType::ManageOwnAccount,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnRelations,
            ActionType::ManageOwnAccount,
            ActionType::ManageAllRecipes,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
        ],
    ),
];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    /// Favorites, shopping cart and subscriptions.
    ManageOwnRelations,
    ManageOwnAccount,

    ManageAllRecipes,
    ManageTags,
    ManageIngredients,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find(|(role, _)| *role == session.role)
            .map(|(_, actions)| actions.contains(&self))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole) -> SessionData {
        SessionData {
            user_id: 1,
            username: String::from("cook"),
            role,
        }
    }

    #[test]
    fn users_manage_only_their_own_objects() {
        let user = session(UserRole::User);

        assert!(ActionType::CreateRecipes.authenticate(&user));
        assert!(ActionType::ManageOwnRecipes.authenticate(&user));
        assert!(ActionType::ManageOwnRelations.authenticate(&user));
        assert!(!ActionType::ManageAllRecipes.authenticate(&user));
        assert!(!ActionType::ManageTags.authenticate(&user));
        assert!(!ActionType::ManageIngredients.authenticate(&user));
    }

    #[test]
    fn admins_manage_everything() {
        let admin = session(UserRole::Admin);

        for action in [
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnRelations,
            ActionType::ManageOwnAccount,
            ActionType::ManageAllRecipes,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
        ] {
            assert!(action.authenticate(&admin), "{action:?}");
        }
    }

    #[test]
    fn owner_check() {
        let user = session(UserRole::User);
        let admin = session(UserRole::Admin);

        assert!(user
            .authenticate_owner(1, ActionType::ManageOwnRecipes, ActionType::ManageAllRecipes)
            .is_ok());
        assert!(user
            .authenticate_owner(2, ActionType::ManageOwnRecipes, ActionType::ManageAllRecipes)
            .is_err());
        assert!(admin
            .authenticate_owner(2, ActionType::ManageOwnRecipes, ActionType::ManageAllRecipes)
            .is_ok());
    }
}
