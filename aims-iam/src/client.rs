//! Request mapper for the AIMS public API

use aims_core::{check_segment, encode_segment, ApiClient, ApiRequest, Error, Verb, SERVICE_NAME};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::models::{
    AccessKey, AccessKeyList, Account, AccountIdList, AccountList, Authentication, Permissions,
    Role, RoleList, TokenInfo, User, UserList, UserQuery,
};

/// Cache hint sent with access key listings
const ACCESS_KEYS_TTL: Duration = Duration::from_secs(60);

/// Client for the AIMS endpoints.
///
/// Every method makes exactly one call on the wrapped [`ApiClient`] and
/// returns whatever that call returned, decoded. Nothing is retried or
/// cached here.
#[derive(Clone)]
pub struct AimsClient {
    client: Arc<dyn ApiClient>,
    service_name: String,
}

impl AimsClient {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self {
            client,
            service_name: SERVICE_NAME.to_string(),
        }
    }

    /// Override the service name placed in every descriptor
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The wrapped transport
    pub fn api_client(&self) -> &Arc<dyn ApiClient> {
        &self.client
    }

    // === Accounts ===

    /// Get account details
    ///
    /// `GET /aims/v1/:account_id/account`
    pub async fn get_account_details(&self, account_id: &str) -> Result<Account, Error> {
        let request = self.account_request(account_id, "/account")?;
        self.send(Verb::Fetch, request).await
    }

    /// List managed accounts
    ///
    /// `GET /aims/v1/:account_id/accounts/managed`
    pub async fn get_managed_accounts<Q>(
        &self,
        account_id: &str,
        query: &Q,
    ) -> Result<AccountList, Error>
    where
        Q: Serialize + Sync + ?Sized,
    {
        let request = self
            .account_request(account_id, "/accounts/managed")?
            .with_query(query)?;
        self.send(Verb::Fetch, request).await
    }

    /// List managed account IDs
    ///
    /// `GET /aims/v1/:account_id/account_ids/managed`
    pub async fn get_managed_account_ids<Q>(
        &self,
        account_id: &str,
        query: &Q,
    ) -> Result<AccountIdList, Error>
    where
        Q: Serialize + Sync + ?Sized,
    {
        let request = self
            .account_request(account_id, "/account_ids/managed")?
            .with_query(query)?;
        self.send(Verb::Fetch, request).await
    }

    /// Update account MFA requirements
    ///
    /// `POST /aims/v1/:account_id/account`
    pub async fn require_mfa(&self, account_id: &str, mfa_required: bool) -> Result<Account, Error> {
        let request = self
            .account_request(account_id, "/account")?
            .with_data(json!({ "mfa_required": mfa_required }));
        self.send(Verb::Post, request).await
    }

    // === Authentication ===

    /// Authenticate a user's identity
    ///
    /// `POST /aims/v1/authenticate`
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        mfa_code: Option<&str>,
    ) -> Result<Authentication, Error> {
        let request = self.request("/authenticate");
        let path = request.scoped_path();
        debug!(path = %path, mfa = mfa_code.is_some(), "AIMS authenticate");

        let value = self
            .client
            .authenticate(request, username, password, mfa_code)
            .await?;
        decode(&path, value)
    }

    /// Complete an MFA challenge with the session token from `authenticate`
    pub async fn authenticate_with_mfa_session_token(
        &self,
        session_token: &str,
        mfa_code: &str,
    ) -> Result<Authentication, Error> {
        let request = self.request("/authenticate");
        let path = request.scoped_path();
        debug!(path = %path, "AIMS authenticate with MFA session token");

        let value = self
            .client
            .authenticate_with_mfa_session_token(request, session_token, mfa_code)
            .await?;
        decode(&path, value)
    }

    /// Change a user's password
    ///
    /// `POST /aims/v1/change_password`
    pub async fn change_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        let request = self.request("/change_password").with_data(json!({
            "email": email,
            "current_password": current_password,
            "new_password": new_password,
        }));
        self.send_unit(Verb::Post, request).await
    }

    /// Obtain account, user and roles for the current token
    ///
    /// `GET /aims/v1/token_info`
    pub async fn token_info(&self) -> Result<TokenInfo, Error> {
        let request = self.request("/token_info");
        self.send(Verb::Fetch, request).await
    }

    /// Initiate the password reset process for a user
    ///
    /// `POST /aims/v1/reset_password`
    pub async fn initiate_reset(&self, email: &str, return_to: &str) -> Result<(), Error> {
        let request = self
            .request("/reset_password")
            .with_data(json!({ "email": email, "return_to": return_to }));
        self.send_unit(Verb::Post, request).await
    }

    /// Reset a user's password using a reset token
    ///
    /// `PUT /aims/v1/reset_password/:token`
    pub async fn reset_with_token(&self, token: &str, password: &str) -> Result<(), Error> {
        let request = self
            .request(&format!("/reset_password/{}", encode_segment(token)?))
            .with_data(json!({ "password": password }));
        self.send_unit(Verb::Set, request).await
    }

    // === Roles ===

    /// Create a role
    ///
    /// `POST /aims/v1/:account_id/roles`
    pub async fn create_role(
        &self,
        account_id: &str,
        name: &str,
        permissions: &Permissions,
    ) -> Result<Role, Error> {
        let request = self
            .account_request(account_id, "/roles")?
            .with_data(json!({ "name": name, "permissions": permissions }));
        self.send(Verb::Post, request).await
    }

    /// Delete a role
    ///
    /// `DELETE /aims/v1/:account_id/roles/:role_id`
    pub async fn delete_role(&self, account_id: &str, role_id: &str) -> Result<(), Error> {
        let request = self.account_request(account_id, &role_path(role_id)?)?;
        self.send_unit(Verb::Delete, request).await
    }

    /// Get a global role, one shared among all accounts
    ///
    /// `GET /aims/v1/roles/:role_id`
    pub async fn get_global_role(&self, role_id: &str) -> Result<Role, Error> {
        let request = self.request(&role_path(role_id)?);
        self.send(Verb::Fetch, request).await
    }

    /// Get a role as seen by an account
    ///
    /// `GET /aims/v1/:account_id/roles/:role_id`
    pub async fn get_account_role(&self, account_id: &str, role_id: &str) -> Result<Role, Error> {
        let request = self.account_request(account_id, &role_path(role_id)?)?;
        self.send(Verb::Fetch, request).await
    }

    /// List global roles
    ///
    /// `GET /aims/v1/roles`
    pub async fn get_global_roles(&self) -> Result<RoleList, Error> {
        let request = self.request("/roles");
        self.send(Verb::Fetch, request).await
    }

    /// List roles for an account, global roles included
    ///
    /// `GET /aims/v1/:account_id/roles`
    pub async fn get_account_roles(&self, account_id: &str) -> Result<RoleList, Error> {
        let request = self.account_request(account_id, "/roles")?;
        self.send(Verb::Fetch, request).await
    }

    /// Update a role's name and permissions.
    ///
    /// This is a partial update: the body carries exactly the given fields
    /// and nothing is merged with the role's current state.
    ///
    /// `POST /aims/v1/:account_id/roles/:role_id`
    pub async fn update_role(
        &self,
        account_id: &str,
        role_id: &str,
        name: &str,
        permissions: &Permissions,
    ) -> Result<Role, Error> {
        let request = self
            .account_request(account_id, &role_path(role_id)?)?
            .with_data(json!({ "name": name, "permissions": permissions }));
        self.send(Verb::Post, request).await
    }

    /// Update a role's name
    ///
    /// `POST /aims/v1/:account_id/roles/:role_id`
    pub async fn update_role_name(
        &self,
        account_id: &str,
        role_id: &str,
        name: &str,
    ) -> Result<Role, Error> {
        let request = self
            .account_request(account_id, &role_path(role_id)?)?
            .with_data(json!({ "name": name }));
        self.send(Verb::Post, request).await
    }

    /// Update a role's permissions
    ///
    /// `POST /aims/v1/:account_id/roles/:role_id`
    pub async fn update_role_permissions(
        &self,
        account_id: &str,
        role_id: &str,
        permissions: &Permissions,
    ) -> Result<Role, Error> {
        let request = self
            .account_request(account_id, &role_path(role_id)?)?
            .with_data(json!({ "permissions": permissions }));
        self.send(Verb::Post, request).await
    }

    // === MFA ===

    /// Enroll an MFA device for the current user
    ///
    /// `POST /aims/v1/user/mfa/enroll`
    pub async fn enroll_mfa<S: AsRef<str> + Sync>(&self, uri: &str, codes: &[S]) -> Result<(), Error> {
        let codes: Vec<&str> = codes.iter().map(AsRef::as_ref).collect();
        let request = self
            .request("/user/mfa/enroll")
            .with_data(json!({ "mfa_uri": uri, "mfa_codes": codes }));
        self.send_unit(Verb::Post, request).await
    }

    /// Remove a user's MFA device
    ///
    /// `DELETE /aims/v1/user/mfa/:email`
    pub async fn delete_mfa(&self, email: &str) -> Result<(), Error> {
        let request = self.request(&format!("/user/mfa/{}", encode_segment(email)?));
        self.send_unit(Verb::Delete, request).await
    }

    // === Users ===

    /// Get user details
    ///
    /// `GET /aims/v1/:account_id/users/:user_id`
    pub async fn get_user_details(
        &self,
        account_id: &str,
        user_id: &str,
        query: Option<&UserQuery>,
    ) -> Result<User, Error> {
        let path = format!("/users/{}", encode_segment(user_id)?);
        let mut request = self.account_request(account_id, &path)?;
        if let Some(query) = query {
            request = request.with_query(query)?;
        }
        self.send(Verb::Fetch, request).await
    }

    /// List users of an account
    ///
    /// `GET /aims/v1/:account_id/users`
    pub async fn get_users(
        &self,
        account_id: &str,
        query: Option<&UserQuery>,
    ) -> Result<UserList, Error> {
        let mut request = self.account_request(account_id, "/users")?;
        if let Some(query) = query {
            request = request.with_query(query)?;
        }
        self.send(Verb::Fetch, request).await
    }

    // === Access keys ===

    /// Create an access key for a user.
    ///
    /// The returned key carries `secret_key`; it is never returned again.
    ///
    /// `POST /aims/v1/:account_id/users/:user_id/access_keys`
    pub async fn create_access_key(
        &self,
        account_id: &str,
        user_id: &str,
        label: &str,
    ) -> Result<AccessKey, Error> {
        let request = self
            .account_request(account_id, &access_keys_path(user_id)?)?
            .with_data(json!({ "label": label }));
        self.send(Verb::Post, request).await
    }

    /// Get an access key
    ///
    /// `GET /aims/v1/access_keys/:access_key_id`
    pub async fn get_access_key(&self, access_key_id: &str) -> Result<AccessKey, Error> {
        let request = self.request(&format!("/access_keys/{}", encode_segment(access_key_id)?));
        self.send(Verb::Fetch, request).await
    }

    /// List a user's access keys in their full representation
    ///
    /// `GET /aims/v1/:account_id/users/:user_id/access_keys?out=full`
    pub async fn get_access_keys(
        &self,
        account_id: &str,
        user_id: &str,
    ) -> Result<AccessKeyList, Error> {
        let request = self
            .account_request(account_id, &access_keys_path(user_id)?)?
            .with_query(&json!({ "out": "full" }))?
            .with_ttl(ACCESS_KEYS_TTL);
        self.send(Verb::Fetch, request).await
    }

    /// Delete an access key
    ///
    /// `DELETE /aims/v1/:account_id/users/:user_id/access_keys/:access_key_id`
    pub async fn delete_access_key(
        &self,
        account_id: &str,
        user_id: &str,
        access_key_id: &str,
    ) -> Result<(), Error> {
        let path = format!(
            "{}/{}",
            access_keys_path(user_id)?,
            encode_segment(access_key_id)?
        );
        let request = self.account_request(account_id, &path)?;
        self.send_unit(Verb::Delete, request).await
    }

    // === Helpers ===

    fn request(&self, path: &str) -> ApiRequest {
        ApiRequest::new(self.service_name.as_str(), path)
    }

    /// The account id travels raw in the descriptor; transports encode it
    fn account_request(&self, account_id: &str, path: &str) -> Result<ApiRequest, Error> {
        let account_id = check_segment(account_id)?;
        Ok(self.request(path).with_account(account_id))
    }

    async fn call(&self, verb: Verb, request: ApiRequest) -> Result<(String, Value), Error> {
        let path = request.scoped_path();
        debug!(verb = %verb, path = %path, "AIMS request");
        let value = self.client.call(verb, request).await?;
        Ok((path, value))
    }

    async fn send<T: DeserializeOwned>(&self, verb: Verb, request: ApiRequest) -> Result<T, Error> {
        let (path, value) = self.call(verb, request).await?;
        decode(&path, value)
    }

    /// For endpoints whose response body carries nothing of interest
    async fn send_unit(&self, verb: Verb, request: ApiRequest) -> Result<(), Error> {
        self.call(verb, request).await.map(|_| ())
    }
}

impl std::fmt::Debug for AimsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AimsClient")
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| Error::decode(path, e))
}

fn role_path(role_id: &str) -> Result<String, Error> {
    Ok(format!("/roles/{}", encode_segment(role_id)?))
}

fn access_keys_path(user_id: &str) -> Result<String, Error> {
    Ok(format!("/users/{}/access_keys", encode_segment(user_id)?))
}
