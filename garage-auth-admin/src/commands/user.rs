use super::read_password;
use crate::client::AdminClient;
use anyhow::Result;
use clap::Subcommand;
use garage_auth_core::{role_catalog, NewUser, Role, UserFilter, UserUpdate, UserView};

#[derive(Subcommand)]
pub enum UserCommands {
    /// List users
    List {
        /// Only users with this role
        #[arg(short, long)]
        role: Option<Role>,
        /// Only active (true) or inactive (false) users
        #[arg(short, long)]
        active: Option<bool>,
        /// Substring of name or email
        #[arg(short, long)]
        search: Option<String>,
        /// Maximum number of users to show
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show account counts
    Stats,
    /// Show assignable roles
    Roles,
    /// Create a new user
    Create {
        /// Email address
        email: String,
        /// Display name
        #[arg(short, long)]
        name: String,
        /// User role (admin, manager, operator, mechanic)
        #[arg(short, long, default_value = "operator")]
        role: Role,
        /// Create the account disabled
        #[arg(long)]
        inactive: bool,
        /// User password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Change a user's role
    SetRole {
        /// Email address
        email: String,
        /// New role (admin, manager, operator, mechanic)
        role: Role,
    },
    /// Disable a user and end their sessions
    Deactivate {
        /// Email address
        email: String,
    },
    /// Re-enable a user
    Activate {
        /// Email address
        email: String,
    },
    /// Set a new password for a user and end their sessions
    ResetPassword {
        /// Email address
        email: String,
        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
}

fn print_users(users: &[UserView]) {
    println!(
        "\n{:<28} {:<24} {:<10} {:<8} {:<20}",
        "EMAIL", "NAME", "ROLE", "ACTIVE", "LAST LOGIN"
    );
    println!("{}", "-".repeat(92));
    for user in users {
        let last_login = user
            .last_login
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<28} {:<24} {:<10} {:<8} {:<20}",
            user.email,
            user.name,
            user.role.as_str(),
            if user.active { "Yes" } else { "No" },
            last_login
        );
    }
}

pub async fn execute_user_command(client: &mut AdminClient, command: UserCommands) -> Result<()> {
    let actor = client.actor()?.clone();
    let service = client.service().clone();

    match command {
        UserCommands::List {
            role,
            active,
            search,
            limit,
        } => {
            let filter = UserFilter {
                role,
                active,
                search,
                limit,
                offset: None,
            };
            let page = service.list_users(&actor, &filter).await?;
            print_users(&page.users);
            println!("\nShowing {} of {} user(s)", page.users.len(), page.total);
        }

        UserCommands::Stats => {
            let stats = service.user_stats(&actor).await?;
            println!("Total:    {}", stats.total);
            println!("Active:   {}", stats.active);
            println!("Inactive: {}", stats.inactive);
            for (role, count) in &stats.by_role {
                println!("  {:<10} {}", role.as_str(), count);
            }
        }

        UserCommands::Roles => {
            for info in role_catalog() {
                println!("{:<10} {:<14} {}", info.value.as_str(), info.label, info.description);
            }
        }

        UserCommands::Create {
            email,
            name,
            role,
            inactive,
            password,
        } => {
            let password = read_password(&format!("Enter password for '{}': ", email), password)?;
            let mut input = NewUser::new(email, name, role);
            input.active = !inactive;

            let user = service.create_user(&actor, input, &password).await?;
            println!("✓ Created user '{}' ({}) with role {}", user.email, user.id, user.role);
        }

        UserCommands::SetRole { email, role } => {
            let target = service.find_user_by_email(&actor, &email).await?;
            let update = UserUpdate {
                role: Some(role),
                ..Default::default()
            };
            let user = service.update_user(&actor, target.id, update).await?;
            println!("✓ '{}' now has role {}", user.email, user.role);
        }

        UserCommands::Deactivate { email } => {
            let target = service.find_user_by_email(&actor, &email).await?;
            let user = service.deactivate_user(&actor, target.id).await?;
            println!("✓ Deactivated '{}' and ended their sessions", user.email);
        }

        UserCommands::Activate { email } => {
            let target = service.find_user_by_email(&actor, &email).await?;
            let user = service.activate_user(&actor, target.id).await?;
            println!("✓ Activated '{}'", user.email);
        }

        UserCommands::ResetPassword { email, password } => {
            let target = service.find_user_by_email(&actor, &email).await?;
            let password =
                read_password(&format!("Enter new password for '{}': ", target.email), password)?;
            service.reset_password(&actor, target.id, &password).await?;
            println!("✓ Password reset for '{}'; existing sessions were ended", target.email);
        }
    }

    Ok(())
}
