use rand::rngs::OsRng;
use rand::RngCore;

/// Secret length in bytes
const SECRET_BYTES: usize = 32;

fn generate_secret() -> anyhow::Result<String> {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}

fn main() -> anyhow::Result<()> {
    let secret = generate_secret()?;
    println!("GATE_API_SECRET={}", secret);
    Ok(())
}
