//! Subcommands and their dispatch onto [`AimsClient`]

use aims_core::{ApiError, Error};
use aims_iam::{AimsClient, Authentication, Permissions, UserQuery};
use anyhow::{anyhow, bail, Context as _};
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Authenticate and print the session
    Login {
        /// Complete an MFA challenge with this session token
        #[arg(long)]
        session_token: Option<String>,
    },

    /// Show account, user and roles for the current token
    TokenInfo,

    /// Account settings
    #[command(subcommand)]
    Account(AccountCommand),

    /// Role management
    #[command(subcommand)]
    Roles(RoleCommand),

    /// User queries
    #[command(subcommand)]
    Users(UserCommand),

    /// Access key management
    #[command(subcommand)]
    AccessKeys(AccessKeyCommand),

    /// MFA devices
    #[command(subcommand)]
    Mfa(MfaCommand),

    /// Password changes and resets
    #[command(subcommand)]
    Password(PasswordCommand),
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// Account details
    Get,
    /// Accounts managed by this one
    Managed {
        /// Extra query parameter, as KEY=VALUE
        #[arg(long = "param", value_parser = parse_pair)]
        params: Vec<(String, String)>,
    },
    /// IDs of accounts managed by this one
    ManagedIds {
        #[arg(long = "param", value_parser = parse_pair)]
        params: Vec<(String, String)>,
    },
    /// Turn the MFA requirement on or off
    RequireMfa {
        #[arg(action = clap::ArgAction::Set)]
        required: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum RoleCommand {
    /// List roles; `--global` lists the shared ones
    List {
        #[arg(long)]
        global: bool,
    },
    Get {
        role_id: String,
        #[arg(long)]
        global: bool,
    },
    Create {
        name: String,
        /// Permission grant, as PERMISSION=EFFECT
        #[arg(long = "permission", value_parser = parse_pair)]
        permissions: Vec<(String, String)>,
    },
    Delete {
        role_id: String,
    },
    /// Change a role's name, permissions, or both
    Update {
        role_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "permission", value_parser = parse_pair)]
        permissions: Vec<(String, String)>,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct UserFlags {
    #[arg(long)]
    include_role_ids: bool,
    #[arg(long)]
    include_user_credential: bool,
}

impl UserFlags {
    fn query(self) -> Option<UserQuery> {
        if !self.include_role_ids && !self.include_user_credential {
            return None;
        }
        let mut query = UserQuery::default();
        if self.include_role_ids {
            query = query.include_role_ids(true);
        }
        if self.include_user_credential {
            query = query.include_user_credential(true);
        }
        Some(query)
    }
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    List {
        #[command(flatten)]
        flags: UserFlags,
    },
    Get {
        user_id: String,
        #[command(flatten)]
        flags: UserFlags,
    },
}

#[derive(Subcommand, Debug)]
pub enum AccessKeyCommand {
    List { user_id: String },
    Get { access_key_id: String },
    /// Create a key; the secret is shown only once
    Create { user_id: String, label: String },
    Delete {
        user_id: String,
        access_key_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum MfaCommand {
    /// Enroll a TOTP device with two consecutive codes
    Enroll {
        uri: String,
        #[arg(required = true, num_args = 1..)]
        codes: Vec<String>,
    },
    /// Remove the MFA device of a user
    Remove { email: String },
}

#[derive(Subcommand, Debug)]
pub enum PasswordCommand {
    Change {
        email: String,
        current_password: String,
        new_password: String,
    },
    /// Send a password reset email
    Reset { email: String, return_to: String },
    /// Set a new password with the token from the reset email
    CompleteReset { token: String, password: String },
}

/// Credentials and defaults shared by every command
#[derive(Debug, Default)]
pub struct Context {
    pub username: Option<String>,
    pub password: Option<String>,
    pub mfa_code: Option<String>,
    pub account_id: Option<String>,
}

impl Context {
    fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        }
    }
}

/// Run `command`; `None` means it produced nothing to print
pub async fn run(
    client: &AimsClient,
    ctx: &Context,
    command: Command,
) -> anyhow::Result<Option<Value>> {
    let is_login = matches!(command, Command::Login { .. });
    if !is_login && ctx.credentials().is_some() {
        login(client, ctx).await?;
    }

    match command {
        Command::Login { session_token } => {
            let auth = match session_token {
                Some(session_token) => {
                    let code = ctx
                        .mfa_code
                        .as_deref()
                        .ok_or_else(|| anyhow!("--mfa-code is required with --session-token"))?;
                    client
                        .authenticate_with_mfa_session_token(&session_token, code)
                        .await?
                }
                None => login(client, ctx).await?,
            };
            output(&auth)
        }
        Command::TokenInfo => output(&client.token_info().await?),
        Command::Account(cmd) => run_account(client, ctx, cmd).await,
        Command::Roles(cmd) => run_roles(client, ctx, cmd).await,
        Command::Users(cmd) => run_users(client, ctx, cmd).await,
        Command::AccessKeys(cmd) => run_access_keys(client, ctx, cmd).await,
        Command::Mfa(cmd) => {
            match cmd {
                MfaCommand::Enroll { uri, codes } => client.enroll_mfa(&uri, &codes).await?,
                MfaCommand::Remove { email } => client.delete_mfa(&email).await?,
            }
            Ok(None)
        }
        Command::Password(cmd) => {
            match cmd {
                PasswordCommand::Change {
                    email,
                    current_password,
                    new_password,
                } => {
                    client
                        .change_password(&email, &current_password, &new_password)
                        .await?;
                }
                PasswordCommand::Reset { email, return_to } => {
                    client.initiate_reset(&email, &return_to).await?;
                }
                PasswordCommand::CompleteReset { token, password } => {
                    client.reset_with_token(&token, &password).await?;
                }
            }
            Ok(None)
        }
    }
}

/// Log in with username and password.
///
/// When the server answers with an MFA challenge and an MFA code was given,
/// the challenge is completed with the returned session token.
async fn login(client: &AimsClient, ctx: &Context) -> anyhow::Result<Authentication> {
    let (username, password) = ctx
        .credentials()
        .ok_or_else(|| anyhow!("--username and --password are required to log in"))?;
    let mfa_code = ctx.mfa_code.as_deref();

    let result = client.authenticate(username, password, mfa_code).await;
    match (result, mfa_code) {
        (Ok(auth), _) => {
            info!(username, "authenticated");
            Ok(auth)
        }
        (
            Err(Error::Api(ApiError {
                session_token: Some(session_token),
                ..
            })),
            Some(code),
        ) => {
            debug!("completing MFA challenge");
            Ok(client
                .authenticate_with_mfa_session_token(&session_token, code)
                .await?)
        }
        (Err(err), _) => Err(err).context("authentication failed"),
    }
}

/// The account a command targets: `--account-id`, or the token's own
async fn account_id(client: &AimsClient, ctx: &Context) -> anyhow::Result<String> {
    if let Some(account_id) = &ctx.account_id {
        return Ok(account_id.clone());
    }
    let info = client.token_info().await?;
    info.account
        .and_then(|account| account.id)
        .ok_or_else(|| anyhow!("no --account-id given and the token names no account"))
}

async fn run_account(
    client: &AimsClient,
    ctx: &Context,
    cmd: AccountCommand,
) -> anyhow::Result<Option<Value>> {
    let account = account_id(client, ctx).await?;
    match cmd {
        AccountCommand::Get => output(&client.get_account_details(&account).await?),
        AccountCommand::Managed { params } => {
            output(&client.get_managed_accounts(&account, &query(params)).await?)
        }
        AccountCommand::ManagedIds { params } => output(
            &client
                .get_managed_account_ids(&account, &query(params))
                .await?,
        ),
        AccountCommand::RequireMfa { required } => {
            output(&client.require_mfa(&account, required).await?)
        }
    }
}

async fn run_roles(
    client: &AimsClient,
    ctx: &Context,
    cmd: RoleCommand,
) -> anyhow::Result<Option<Value>> {
    match cmd {
        RoleCommand::List { global: true } => output(&client.get_global_roles().await?),
        RoleCommand::List { global: false } => {
            let account = account_id(client, ctx).await?;
            output(&client.get_account_roles(&account).await?)
        }
        RoleCommand::Get {
            role_id,
            global: true,
        } => output(&client.get_global_role(&role_id).await?),
        RoleCommand::Get {
            role_id,
            global: false,
        } => {
            let account = account_id(client, ctx).await?;
            output(&client.get_account_role(&account, &role_id).await?)
        }
        RoleCommand::Create { name, permissions } => {
            let account = account_id(client, ctx).await?;
            let permissions: Permissions = permissions.into_iter().collect();
            output(&client.create_role(&account, &name, &permissions).await?)
        }
        RoleCommand::Delete { role_id } => {
            let account = account_id(client, ctx).await?;
            client.delete_role(&account, &role_id).await?;
            Ok(None)
        }
        RoleCommand::Update {
            role_id,
            name,
            permissions,
        } => {
            let permissions: Permissions = permissions.into_iter().collect();
            if name.is_none() && permissions.is_empty() {
                bail!("nothing to update: pass --name or --permission");
            }
            let account = account_id(client, ctx).await?;
            let role = match name {
                Some(name) if permissions.is_empty() => {
                    client.update_role_name(&account, &role_id, &name).await?
                }
                Some(name) => {
                    client
                        .update_role(&account, &role_id, &name, &permissions)
                        .await?
                }
                None => {
                    client
                        .update_role_permissions(&account, &role_id, &permissions)
                        .await?
                }
            };
            output(&role)
        }
    }
}

async fn run_users(
    client: &AimsClient,
    ctx: &Context,
    cmd: UserCommand,
) -> anyhow::Result<Option<Value>> {
    let account = account_id(client, ctx).await?;
    match cmd {
        UserCommand::List { flags } => {
            output(&client.get_users(&account, flags.query().as_ref()).await?)
        }
        UserCommand::Get { user_id, flags } => output(
            &client
                .get_user_details(&account, &user_id, flags.query().as_ref())
                .await?,
        ),
    }
}

async fn run_access_keys(
    client: &AimsClient,
    ctx: &Context,
    cmd: AccessKeyCommand,
) -> anyhow::Result<Option<Value>> {
    match cmd {
        AccessKeyCommand::Get { access_key_id } => {
            output(&client.get_access_key(&access_key_id).await?)
        }
        AccessKeyCommand::List { user_id } => {
            let account = account_id(client, ctx).await?;
            output(&client.get_access_keys(&account, &user_id).await?)
        }
        AccessKeyCommand::Create { user_id, label } => {
            let account = account_id(client, ctx).await?;
            output(&client.create_access_key(&account, &user_id, &label).await?)
        }
        AccessKeyCommand::Delete {
            user_id,
            access_key_id,
        } => {
            let account = account_id(client, ctx).await?;
            client
                .delete_access_key(&account, &user_id, &access_key_id)
                .await?;
            Ok(None)
        }
    }
}

fn output<T: Serialize>(value: &T) -> anyhow::Result<Option<Value>> {
    Ok(Some(serde_json::to_value(value)?))
}

/// Query parameters from KEY=VALUE pairs; `true`, `false` and numbers are
/// sent as such
fn query(pairs: Vec<(String, String)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| {
            let value = serde_json::from_str::<Value>(&value)
                .ok()
                .filter(|v| v.is_boolean() || v.is_number())
                .unwrap_or(Value::String(value));
            (key, value)
        })
        .collect()
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}
