//! Hand-built IR fixtures shared by the crate's tests

use crate::shared::models::ir::{
    Block, CfgEdge, CfgEdgeKind, Function, InstKind, Instruction, Module, ValueId,
};

fn v(n: u32) -> ValueId {
    ValueId(n)
}

/// `int main() { int x; int *p = &x; int y = *p; return y; }`
///
/// Values: main=1, alloca x=2, store=3, load=4, ret=5.
pub fn scenario_store_load() -> Module {
    Module::new(vec![Function {
        name: "main".into(),
        value: v(1),
        params: vec![],
        blocks: vec![Block::new(vec![
            Instruction::new(
                v(2),
                InstKind::Alloca {
                    size: 4,
                    zeroed: false,
                },
            ),
            Instruction::new(
                v(3),
                InstKind::Store {
                    pointer: v(2),
                    value: None,
                },
            ),
            Instruction::new(v(4), InstKind::Load { pointer: v(2) }),
            Instruction::new(v(5), InstKind::Ret { value: Some(v(4)) }),
        ])],
    }])
}

/// `f` calls `g(p)` where `g` loads through its argument.
///
/// Values: f=1, g=2, alloca=11, call=12, ret f=13, formal=20, load=21,
/// ret g=22.
pub fn scenario_call_pair() -> Module {
    Module::new(vec![
        Function {
            name: "f".into(),
            value: v(1),
            params: vec![],
            blocks: vec![Block::new(vec![
                Instruction::new(
                    v(11),
                    InstKind::Alloca {
                        size: 4,
                        zeroed: false,
                    },
                ),
                Instruction::new(
                    v(12),
                    InstKind::Call {
                        callee: v(2),
                        args: vec![v(11)],
                    },
                ),
                Instruction::new(v(13), InstKind::Ret { value: None }),
            ])],
        },
        Function {
            name: "g".into(),
            value: v(2),
            params: vec![v(20)],
            blocks: vec![Block::new(vec![
                Instruction::new(v(21), InstKind::Load { pointer: v(20) }),
                Instruction::new(v(22), InstKind::Ret { value: Some(v(21)) }),
            ])],
        },
    ])
}

/// `f` calls itself, then returns. Values: f=1, call=10, ret=11.
pub fn scenario_self_recursion() -> Module {
    Module::new(vec![Function {
        name: "f".into(),
        value: v(1),
        params: vec![],
        blocks: vec![Block::new(vec![
            Instruction::new(
                v(10),
                InstKind::Call {
                    callee: v(1),
                    args: vec![],
                },
            ),
            Instruction::new(v(11), InstKind::Ret { value: None }),
        ])],
    }])
}

/// `p = &a; *p = &b; p = &c; *p = &d;` through a stack slot `p`
///
/// Values: main=1, a=2, b=3, c=4, d=5, p=6,
/// store &a->p =7, load p=8, store &b->*=9,
/// store &c->p =10, load p=11, store &d->*=12, ret=13.
pub fn scenario_strong_update() -> Module {
    let alloca = |id: u32| {
        Instruction::new(
            v(id),
            InstKind::Alloca {
                size: 8,
                zeroed: false,
            },
        )
    };
    Module::new(vec![Function {
        name: "main".into(),
        value: v(1),
        params: vec![],
        blocks: vec![Block::new(vec![
            alloca(2),
            alloca(3),
            alloca(4),
            alloca(5),
            alloca(6),
            Instruction::new(
                v(7),
                InstKind::Store {
                    pointer: v(6),
                    value: Some(v(2)),
                },
            ),
            Instruction::new(v(8), InstKind::Load { pointer: v(6) }),
            Instruction::new(
                v(9),
                InstKind::Store {
                    pointer: v(8),
                    value: Some(v(3)),
                },
            ),
            Instruction::new(
                v(10),
                InstKind::Store {
                    pointer: v(6),
                    value: Some(v(4)),
                },
            ),
            Instruction::new(v(11), InstKind::Load { pointer: v(6) }),
            Instruction::new(
                v(12),
                InstKind::Store {
                    pointer: v(11),
                    value: Some(v(5)),
                },
            ),
            Instruction::new(v(13), InstKind::Ret { value: None }),
        ])],
    }])
}

/// A function that never returns: a single block branching to itself.
/// Values: f=1, br=2.
pub fn scenario_infinite_loop() -> Module {
    Module::new(vec![Function {
        name: "main".into(),
        value: v(1),
        params: vec![],
        blocks: vec![
            Block::new(vec![Instruction::new(v(2), InstKind::Branch)])
                .with_successors(vec![CfgEdge::to(0)]),
        ],
    }])
}

/// Diamond CFG: bb0 branches to bb1/bb2, both join in bb3 which returns.
///
/// Values: main=1, br0=2, op1=3, br1=4, op2=5, br2=6, ret=7.
pub fn scenario_diamond() -> Module {
    Module::new(vec![Function {
        name: "main".into(),
        value: v(1),
        params: vec![],
        blocks: vec![
            Block::new(vec![Instruction::new(v(2), InstKind::Branch)]).with_successors(vec![
                CfgEdge {
                    target: 1,
                    kind: CfgEdgeKind::TrueBranch,
                },
                CfgEdge {
                    target: 2,
                    kind: CfgEdgeKind::FalseBranch,
                },
            ]),
            Block::new(vec![
                Instruction::new(v(3), InstKind::Other),
                Instruction::new(v(4), InstKind::Branch),
            ])
            .with_successors(vec![CfgEdge::to(3)]),
            Block::new(vec![
                Instruction::new(v(5), InstKind::Other),
                Instruction::new(v(6), InstKind::Branch),
            ])
            .with_successors(vec![CfgEdge::to(3)]),
            Block::new(vec![Instruction::new(v(7), InstKind::Ret { value: None })]),
        ],
    }])
}
