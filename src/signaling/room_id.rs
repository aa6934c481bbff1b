use rand::Rng;
use rand::distributions::Alphanumeric;

pub const ROOM_ID_LEN: usize = 8;

/// Random alphanumeric room ID drawn from `rng`.
pub fn generate_room_id<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect()
}
