#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::auth::token::{GrantType, Token};
    use crate::auth::token_store::TokenStore;
    use crate::gateway::error::ApiError;
    use crate::helpers::time::refresh_due_at;

    #[test]
    fn fresh_store_needs_refresh() {
        let store = TokenStore::new("", "R1");
        assert!(!store.is_authenticated());
        assert!(store.needs_refresh(Utc::now()));
        assert_eq!(store.current_refresh_token(), "R1");
    }

    #[test]
    fn authorization_code_grant_consumes_the_code() {
        let mut store = TokenStore::new("ABC", "");
        let issued_at = Utc::now();
        store.apply(&Token::new("A1", "R1", 3600), GrantType::AuthorizationCode, issued_at);

        assert!(store.is_authenticated());
        assert_eq!(store.current_access_token(), "A1");
        assert_eq!(store.current_refresh_token(), "R1");
        assert_eq!(store.authorization_code(), "");
        assert_eq!(store.refresh_due(), issued_at + Duration::seconds(3300));
        assert!(!store.needs_refresh(issued_at));
        assert!(store.needs_refresh(issued_at + Duration::seconds(3300)));
    }

    #[test]
    fn refresh_grant_keeps_code_and_old_refresh_token_when_not_rotated() {
        let mut store = TokenStore::new("", "R1");
        store.apply(&Token::new("A2", "", 3600), GrantType::RefreshToken, Utc::now());
        assert_eq!(store.current_refresh_token(), "R1");
        assert_eq!(store.current_access_token(), "A2");
    }

    #[test]
    fn short_lived_token_is_due_immediately() {
        let mut store = TokenStore::new("", "R1");
        let issued_at = Utc::now();
        store.apply(&Token::new("A1", "R1", 100), GrantType::RefreshToken, issued_at);
        assert_eq!(store.refresh_due(), issued_at - Duration::seconds(200));
        assert!(store.needs_refresh(issued_at));
    }

    #[test]
    fn pending_authorization_code_forces_refresh() {
        let mut store = TokenStore::new("", "R1");
        let issued_at = Utc::now();
        store.apply(&Token::new("A1", "R2", 3600), GrantType::RefreshToken, issued_at);
        assert!(!store.needs_refresh(issued_at));

        store.set_credentials("NEW", "R2");
        assert!(!store.is_authenticated());
        assert!(store.needs_refresh(issued_at));
        assert_eq!(store.snapshot().authorization_code, "NEW");
    }

    #[test]
    fn reset_drops_only_the_access_token() {
        let mut store = TokenStore::new("", "R1");
        store.apply(&Token::new("A1", "R2", 3600), GrantType::RefreshToken, Utc::now());
        store.reset_access_token();
        assert!(!store.is_authenticated());
        assert_eq!(store.current_refresh_token(), "R2");
    }

    #[test]
    fn token_response_accepts_string_expiry() {
        let token = Token::from_response(r#"{"access_token":"A1","refresh_token":"R1","expires_in":"1799"}"#).unwrap();
        assert_eq!(token.expires_in_seconds, 1799);
        assert_eq!(token.refresh_token, "R1");

        let token = Token::from_response(r#"{"access_token":"A1"}"#).unwrap();
        assert_eq!(token.expires_in_seconds, 0);
        assert_eq!(token.refresh_token, "");
    }

    #[test]
    fn token_response_expiry_is_clamped() {
        let token =
            Token::from_response(r#"{"access_token":"A1","expires_in":100000000000000}"#).unwrap();
        assert_eq!(token.expires_in_seconds, i32::MAX as i64);

        let mut store = TokenStore::new("", "R1");
        let issued_at = Utc::now();
        store.apply(&token, GrantType::RefreshToken, issued_at);
        assert!(store.refresh_due() > issued_at);
        assert!(!store.needs_refresh(issued_at));

        let token = Token::from_response(r#"{"access_token":"A1","expires_in":"-5"}"#).unwrap();
        assert_eq!(token.expires_in_seconds, 0);
        store.apply(&token, GrantType::RefreshToken, issued_at);
        assert!(store.needs_refresh(issued_at));
    }

    #[test]
    fn out_of_range_lifetime_is_due_at_issue_time() {
        let issued_at = Utc::now();
        assert_eq!(refresh_due_at(issued_at, i64::MAX), issued_at);
        assert_eq!(refresh_due_at(issued_at, i64::MIN), issued_at);
        assert_eq!(refresh_due_at(issued_at, 3600), issued_at + Duration::seconds(3300));
    }

    #[test]
    fn token_response_without_access_token_is_invalid() {
        for body in [r#"{"refresh_token":"R1"}"#, r#"{"access_token":""}"#, "<html>oops</html>"] {
            let err = Token::from_response(body).unwrap_err();
            assert!(matches!(err, ApiError::InvalidResponse(_)), "body {}: {:?}", body, err);
        }
    }
}
