use super::{
    client::ApiClient,
    types::{ApiError, LoginRequest, LoginResponse, UserResponse, VerifyResponse},
};

impl ApiClient {
    /// Exchanges credentials for a token. Persisting the token is left to
    /// the caller so a failed login can never leave one behind.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let url = self.url("/auth/login").await;
        self.send_json(self.http_client().post(url).json(request))
            .await
    }

    /// Confirms the stored token with the server.
    pub async fn verify(&self) -> Result<UserResponse, ApiError> {
        let headers = self.get_auth_headers()?;
        let url = self.url("/auth/verify").await;
        let response: VerifyResponse = self
            .send_json(self.http_client().get(url).headers(headers))
            .await?;
        if response.valid {
            Ok(response.user)
        } else {
            self.session().clear_token();
            Err(ApiError::auth_required())
        }
    }
}
