use jsonwebtoken::{DecodingKey, Validation, decode};

use crate::models::{Claims, TokenType};

/// Decodes an HS256 token and accepts it only as an access token.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())?;

    if claims.token_type != TokenType::Access {
        return Err("refresh tokens cannot be used for API calls".to_string());
    }
    Ok(claims)
}


#[cfg(test)]
mod tests {
    use super::test_tokens::token;
    use super::*;

    #[test]
    fn accepts_access_tokens_only() {
        let access = token(7, 2, TokenType::Access, "secret");
        let claims = verify_token(&access, "secret").unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.role, 2);

        let refresh = token(7, 2, TokenType::Refresh, "secret");
        assert!(verify_token(&refresh, "secret").is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let access = token(7, 1, TokenType::Access, "secret");
        assert!(verify_token(&access, "other").is_err());
    }
}
