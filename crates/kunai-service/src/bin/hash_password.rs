use kunai_service::auth::password::{PasswordAlgorithm, hash_password};

/// Usage: `kunai-hash-password <password> [bcrypt|argon2]`
fn main() {
    let mut args = std::env::args().skip(1);
    let password = args.next().unwrap_or_else(|| "password".to_string());

    let algorithm = match args.next().map_or(Ok(PasswordAlgorithm::Bcrypt), |a| a.parse()) {
        Ok(algorithm) => algorithm,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    match hash_password(&password, algorithm) {
        Ok(hash) => {
            println!("{hash}");
        }
        Err(err) => {
            eprintln!("Failed to hash password: {err}");
            std::process::exit(1);
        }
    }
}
