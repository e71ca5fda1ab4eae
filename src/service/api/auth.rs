use reqwest::Method;
use tracing::instrument;

use super::{ApiClient, Result};
use crate::model::{
    AuthResponse, Credentials, OtpVerification, PasswordReset, PasswordResetRequest, Session,
};

impl ApiClient {
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let endpoint = self.endpoint(["auth", "login"])?;
        let request = self.request(Method::POST, &endpoint, None).json(credentials);

        self.fetch(&endpoint, request).await
    }

    #[instrument(skip_all, fields(email = %verification.email))]
    pub async fn verify_otp(&self, verification: &OtpVerification) -> Result<AuthResponse> {
        let endpoint = self.endpoint(["auth", "verify-otp"])?;
        let request = self.request(Method::POST, &endpoint, None).json(verification);

        self.fetch(&endpoint, request).await
    }

    #[instrument(skip_all, fields(user = %session.user.id))]
    pub async fn logout(&self, session: &Session) -> Result<()> {
        let endpoint = self.endpoint(["auth", "logout"])?;
        let request = self.request(Method::POST, &endpoint, Some(session));

        self.execute(&endpoint, request).await
    }

    #[instrument(skip_all, fields(email = %reset.email))]
    pub async fn forgot_password(&self, reset: &PasswordResetRequest) -> Result<()> {
        let endpoint = self.endpoint(["auth", "forgot-password"])?;
        let request = self.request(Method::POST, &endpoint, None).json(reset);

        self.execute(&endpoint, request).await
    }

    #[instrument(skip_all)]
    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<()> {
        let endpoint = self.endpoint(["auth", "reset-password"])?;
        let request = self.request(Method::POST, &endpoint, None).json(reset);

        self.execute(&endpoint, request).await
    }
}
