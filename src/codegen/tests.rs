use std::collections::HashSet;

use indoc::indoc;
use pretty_assertions::assert_eq;

use super::{
    x86_64::{constant_symbol, MAX_DEPTH},
    Target,
};
use crate::util::test_utils::asm_of;

#[test]
fn test_constant_symbols() {
    let cases = [
        ("3", "const_3"),
        ("0.03", "const_0_03"),
        ("-3", "const_neg_3"),
        ("-3.3", "const_neg_3_3"),
        ("0", "const_0"),
        ("-0", "const_neg_0"),
        ("3.0", "const_3_0"),
        ("30", "const_30"),
    ];
    for (literal, symbol) in cases {
        assert_eq!(constant_symbol(literal).to_string(), symbol);
    }
}

#[test]
fn test_single_push_program() {
    let asm = asm_of("7", Target::x86_64_linux, false);
    let expected = indoc! {r#"
        .intel_syntax noprefix
        .section .note.GNU-stack,"",@progbits

        .section .data
        .p2align 3
        scratch_a: .double 0.0
        scratch_b: .double 0.0
        scratch_int: .quad 0
        depth: .quad 0
        fmt_result: .asciz "Result %g\n"
        msg_div_zero: .asciz "Attempted division by zero.  Aborting\n"
        msg_overflow: .asciz "Overflow - value out of range.  Aborting\n"
        msg_stack_err: .asciz "Insufficient entries on the stack.  Aborting\n"
        msg_stack_full: .asciz "Too many entries remaining on the stack.  Aborting\n"
        const_7: .double 7

        .section .text
        .global main
        main:
            push rbp
            mov rbp, rsp
            mov qword ptr [rip + depth], 0

            # [PUSH 7]
            mov rax, qword ptr [rip + depth]
            cmp rax, 262144
            jae stack_too_full
            mov rax, qword ptr [rip + const_7]
            push rax
            inc qword ptr [rip + depth]

            # [RESULT]
            mov rax, qword ptr [rip + depth]
            cmp rax, 1
            ja stack_too_full
            jb stack_error
            pop rax
            movq xmm0, rax
            lea rdi, [rip + fmt_result]
            mov eax, 1
            call printf@PLT
            xor eax, eax
            mov rsp, rbp
            pop rbp
            ret

        division_by_zero:
            lea rdi, [rip + msg_div_zero]
            jmp print_msg_and_exit

        register_overflow:
            lea rdi, [rip + msg_overflow]
            jmp print_msg_and_exit

        stack_too_full:
            lea rdi, [rip + msg_stack_full]
            jmp print_msg_and_exit

        stack_error:
            lea rdi, [rip + msg_stack_err]

        print_msg_and_exit:
            and rsp, -16
            xor eax, eax
            call printf@PLT
            mov edi, 1
            call exit@PLT
    "#};
    assert_eq!(asm.trim_end(), expected.trim_end());
}

#[test]
fn test_binary_block_guards_and_shrinks_depth() {
    let asm = asm_of("3 4 +", Target::x86_64_linux, false);
    let expected = indoc! {"
            # [PLUS]
            mov rax, qword ptr [rip + depth]
            cmp rax, 2
            jb stack_error
            pop rax
            mov qword ptr [rip + scratch_a], rax
            pop rax
            mov qword ptr [rip + scratch_b], rax
            fld qword ptr [rip + scratch_b]
            fadd qword ptr [rip + scratch_a]
            fstp qword ptr [rip + scratch_a]
            mov rax, qword ptr [rip + scratch_a]
            push rax
            dec qword ptr [rip + depth]
    "};
    let expected: String = expected.lines().map(|l| format!("    {l}\n")).collect();
    assert!(asm.contains(&expected), "{asm}");
}

#[test]
fn test_divide_checks_divisor_before_dividing() {
    let asm = asm_of("3 0 /", Target::x86_64_linux, false);
    let check = asm.find("jz division_by_zero").unwrap();
    let divide = asm.find("fdiv ").unwrap();
    assert!(check < divide);
}

#[test]
fn test_modulus_guards_zero_divisor() {
    let asm = asm_of("10 3 %", Target::x86_64_linux, false);
    assert!(asm.contains("    cvttsd2si rcx, qword ptr [rip + scratch_a]\n"));
    assert!(asm.contains("    test rcx, rcx\n    jz division_by_zero\n"));
    assert!(asm.contains("    cqo\n    idiv rcx\nmodulus_done_2:\n"));
}

#[test]
fn test_unary_blocks_keep_depth() {
    for (src, op) in [
        ("1 abs", "fabs"),
        ("1 sin", "fsin"),
        ("1 cos", "fcos"),
        ("1 sqrt", "fsqrt"),
        ("1 tan", "fsincos"),
    ] {
        let asm = asm_of(src, Target::x86_64_linux, false);
        assert!(asm.contains(&format!("    {op}\n")), "{src}");
        assert!(asm.contains("    cmp rax, 1\n    jb stack_error\n"), "{src}");
        // Only the push touches the depth cell.
        assert_eq!(asm.matches("inc qword ptr [rip + depth]").count(), 1, "{src}");
        assert_eq!(asm.matches("dec qword ptr [rip + depth]").count(), 0, "{src}");
    }
}

#[test]
fn test_stack_operations() {
    let asm = asm_of("3 dup swap -", Target::x86_64_linux, false);
    assert!(asm.contains("    pop rax\n    push rax\n    push rax\n    inc qword ptr"));
    assert!(asm.contains("    pop rax\n    pop rcx\n    push rax\n    push rcx\n"));
    assert_eq!(asm.matches("inc qword ptr [rip + depth]").count(), 2);
    assert_eq!(asm.matches("dec qword ptr [rip + depth]").count(), 1);
}

#[test]
fn test_growing_blocks_check_the_depth_ceiling() {
    let guard = format!(
        "    mov rax, qword ptr [rip + depth]\n    cmp rax, {MAX_DEPTH}\n    jae stack_too_full\n"
    );
    // Two pushes and a dup; nothing else grows the stack.
    let asm = asm_of("3 dup * sqrt 2 swap -", Target::x86_64_linux, false);
    assert_eq!(asm.matches(&guard).count(), 3, "{asm}");
    assert!(asm.contains(&format!(
        "    jb stack_error\n{guard}    pop rax\n    push rax\n    push rax\n"
    )));
}

#[test]
fn test_constants_are_emitted_once() {
    let asm = asm_of("3 3 + 3 *", Target::x86_64_linux, false);
    assert_eq!(asm.matches("const_3: .double 3\n").count(), 1);
    assert_eq!(asm.matches("mov rax, qword ptr [rip + const_3]").count(), 3);
}

#[test]
fn test_constants_keep_first_seen_order() {
    let asm = asm_of("2 -1.5 + 2 * 0.25 /", Target::x86_64_linux, false);
    let data: Vec<_> = asm.lines().filter(|l| l.starts_with("const_")).collect();
    assert_eq!(
        data,
        [
            "const_2: .double 2",
            "const_neg_1_5: .double -1.5",
            "const_0_25: .double 0.25",
        ]
    );
}

#[test]
fn test_labels_are_unique_per_instruction() {
    let asm = asm_of("2 3 ^ 2 ^ 5 % 3 % ! 4 ! *", Target::x86_64_linux, false);
    let labels: Vec<_> = asm
        .lines()
        .filter(|l| !l.starts_with(' ') && !l.starts_with('.') && l.ends_with(':'))
        .collect();
    let unique: HashSet<_> = labels.iter().collect();
    assert_eq!(labels.len(), unique.len(), "{labels:?}");

    for label in [
        "power_loop_2:",
        "power_loop_4:",
        "power_zero_2:",
        "power_done_4:",
        "modulus_done_6:",
        "modulus_done_8:",
        "factorial_loop_9:",
        "factorial_loop_11:",
    ] {
        assert!(labels.contains(&label), "missing {label}");
    }
}

#[test]
fn test_power_loop_checks_overflow() {
    let asm = asm_of("2 8 ^", Target::x86_64_linux, false);
    assert!(asm.contains(indoc! {"
        power_loop_2:
            imul rax, rsi
            jo register_overflow
            dec rcx
            jnz power_loop_2
    "}));
}

#[test]
fn test_debug_breakpoint() {
    let plain = asm_of("1", Target::x86_64_linux, false);
    let debug = asm_of("1", Target::x86_64_linux, true);
    assert!(!plain.contains("int3"));
    assert!(debug.contains("    mov qword ptr [rip + depth], 0\n    int3\n"));
}

#[test]
fn test_darwin_spelling() {
    let asm = asm_of("1 2 +", Target::x86_64_darwin, false);
    assert!(asm.contains(".global _main\n_main:\n"));
    assert!(asm.contains("call _printf\n"));
    assert!(asm.contains("call _exit\n"));
    assert!(!asm.contains("@PLT"));
    assert!(!asm.contains("GNU-stack"));
}

#[test]
fn test_output_is_deterministic() {
    for target in Target::ALL {
        let src = "1 2 3 4 5 + - * / 2 ^ pi e + +";
        assert_eq!(asm_of(src, *target, false), asm_of(src, *target, false));
    }
}
