//! Session commands.

use bazaar_client::{ClientError, Storefront};
use secrecy::SecretString;

/// Sign in and report the cart that came with the session.
#[allow(clippy::print_stdout)]
pub async fn login(storefront: &Storefront, email: &str, password: String) -> Result<(), ClientError> {
    let user = storefront.login(email, &SecretString::from(password)).await?;
    println!(
        "Signed in as {} ({}); {} items in cart",
        user.name,
        user.account_type,
        storefront.cart().total_items()
    );
    Ok(())
}

/// Create an account and sign in.
#[allow(clippy::print_stdout)]
pub async fn register(
    storefront: &Storefront,
    name: &str,
    email: &str,
    password: String,
) -> Result<(), ClientError> {
    let user = storefront
        .register(name, email, &SecretString::from(password))
        .await?;
    println!("Account created for {} <{email}>", user.name);
    Ok(())
}

/// Sign out locally.
#[allow(clippy::print_stdout)]
pub async fn logout(storefront: &Storefront) {
    if !storefront.logout().await {
        println!("Not signed in");
    }
}

/// Show the signed-in user, refreshing the profile from the server.
#[allow(clippy::print_stdout)]
pub async fn whoami(storefront: &Storefront) -> Result<(), ClientError> {
    match storefront.profile().await? {
        Some(user) => {
            println!("{} ({})", user.name, user.id);
            if let Some(email) = &user.email {
                println!("  email:   {email}");
            }
            println!("  account: {}", user.account_type);
            if user.is_seller() {
                println!("  shop:    can manage a shop");
            }
            if let Some(created_at) = user.created_at {
                println!("  since:   {}", created_at.format("%Y-%m-%d"));
            }
        }
        None => println!("Not signed in"),
    }
    Ok(())
}
