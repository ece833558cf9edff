/// A long, valid expression that touches every operator. The running depth
/// never exceeds four, and one value is left once all rounds are folded.
pub fn long_expression(rounds: usize) -> String {
    const ROUND: &str = "2.5 3 + dup * 7 % 4 swap - abs sqrt 2 ^ 3 ! / sin cos tan pi e * - +";
    let mut src = String::from("1");
    for _ in 0..rounds {
        src.push(' ');
        src.push_str(ROUND);
    }
    src
}
